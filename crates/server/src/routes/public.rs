//! Unauthenticated quote flow: creation from the configurator form and
//! the token-gated signing page. Responses stay client-facing; staff
//! fields never leave through these handlers.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use devisio_core::signature::resolve_client_ip;
use devisio_core::{PriceBreakdown, Quote, QuoteStatus};

use crate::quotes::{CreateQuoteRequest, RejectQuoteRequest, SignQuoteRequest};
use crate::routes::{error_response, ApiState};

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/", post(create_quote))
        .route("/{token}", get(view_quote))
        .route("/{token}/sign", post(sign_quote))
        .route("/{token}/reject", post(reject_quote))
}

/// What the configurator needs to show its confirmation page and build
/// the signing link.
#[derive(Clone, Debug, Serialize)]
pub struct QuoteCreated {
    pub number: String,
    pub status: QuoteStatus,
    pub signature_token: String,
    pub expires_at: DateTime<Utc>,
    pub pricing: PriceBreakdown,
}

impl From<Quote> for QuoteCreated {
    fn from(quote: Quote) -> Self {
        Self {
            number: quote.number.0,
            status: quote.status,
            signature_token: quote.signature_token.0,
            expires_at: quote.expires_at,
            pricing: quote.pricing,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DecisionRecorded {
    pub number: String,
    pub status: QuoteStatus,
    pub signer_name: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl From<Quote> for DecisionRecorded {
    fn from(quote: Quote) -> Self {
        Self {
            number: quote.number.0,
            status: quote.status,
            signer_name: quote.signer_name,
            signed_at: quote.signed_at,
        }
    }
}

/// The configurator fetches the whole active catalog in one request.
pub(crate) async fn catalog_listing(State(state): State<ApiState>) -> Response {
    match state.service.catalog_listing().await {
        Ok(listing) => Json(listing).into_response(),
        Err(error) => error_response(error),
    }
}

async fn create_quote(
    State(state): State<ApiState>,
    Json(request): Json<CreateQuoteRequest>,
) -> Response {
    match state.service.create_quote(request).await {
        Ok(quote) => {
            (StatusCode::CREATED, Json(QuoteCreated::from(quote))).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn view_quote(State(state): State<ApiState>, Path(token): Path<String>) -> Response {
    match state.service.view_quote(&token).await {
        Ok(view) => Json(view).into_response(),
        Err(error) => error_response(error),
    }
}

async fn sign_quote(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<SignQuoteRequest>,
) -> Response {
    let forwarded = headers.get("x-forwarded-for").and_then(|value| value.to_str().ok());
    let client_ip = resolve_client_ip(forwarded, &peer.ip().to_string());
    match state.service.sign_quote(&token, request, &client_ip).await {
        Ok(quote) => Json(DecisionRecorded::from(quote)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn reject_quote(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    Json(request): Json<RejectQuoteRequest>,
) -> Response {
    match state.service.reject_by_token(&token, request).await {
        Ok(quote) => Json(DecisionRecorded::from(quote)).into_response(),
        Err(error) => error_response(error),
    }
}
