//! Staff API behind the static bearer token. Staff read the full quote
//! shape, including internal notes and signature metadata.

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use devisio_core::{QuoteId, QuoteStatus};
use devisio_db::repositories::QuoteListFilter;

use crate::quotes::RejectQuoteRequest;
use crate::routes::{error_response, ApiError, ApiState};

pub fn router(state: ApiState) -> Router<ApiState> {
    Router::new()
        .route("/", get(list_quotes))
        .route("/statistics", get(statistics))
        .route("/{id}", get(get_quote))
        .route("/{id}/resend", post(resend_quote))
        .route("/{id}/reject", post(reject_quote))
        .route("/{id}/duplicate", post(duplicate_quote))
        .route("/{id}/document", get(download_document))
        .route("/{id}/emails", get(email_log))
        .layer(middleware::from_fn_with_state(state, require_staff_token))
}

async fn require_staff_token(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.staff_token.expose_secret());

    if !authorized {
        let correlation_id = Uuid::new_v4().simple().to_string();
        warn!(
            event_name = "http.auth_failed",
            correlation_id = %correlation_id,
            path = %request.uri().path(),
            "staff token missing or wrong"
        );
        let body = ApiError { error: "A valid staff token is required.".to_owned(), correlation_id };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }
    next.run(request).await
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<QuoteStatus>,
    search: Option<String>,
    created_from: Option<NaiveDate>,
    created_to: Option<NaiveDate>,
}

impl From<ListQuery> for QuoteListFilter {
    fn from(query: ListQuery) -> Self {
        Self {
            status: query.status,
            search: query.search,
            created_from: query.created_from,
            created_to: query.created_to,
        }
    }
}

async fn list_quotes(State(state): State<ApiState>, Query(query): Query<ListQuery>) -> Response {
    match state.service.list_quotes(query.into()).await {
        Ok(quotes) => Json(quotes).into_response(),
        Err(error) => error_response(error),
    }
}

async fn statistics(State(state): State<ApiState>) -> Response {
    match state.service.statistics().await {
        Ok(stats) => Json(stats).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_quote(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.get_quote(&QuoteId(id)).await {
        Ok(quote) => Json(quote).into_response(),
        Err(error) => error_response(error),
    }
}

async fn resend_quote(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.resend_quote(&QuoteId(id)).await {
        Ok(quote) => Json(quote).into_response(),
        Err(error) => error_response(error),
    }
}

async fn reject_quote(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<RejectQuoteRequest>,
) -> Response {
    match state.service.reject_by_id(&QuoteId(id), request).await {
        Ok(quote) => Json(quote).into_response(),
        Err(error) => error_response(error),
    }
}

async fn duplicate_quote(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.duplicate_quote(&QuoteId(id)).await {
        Ok(quote) => (StatusCode::CREATED, Json(quote)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn download_document(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.fetch_document(&QuoteId(id)).await {
        Ok((filename, document)) => document.into_response(&filename),
        Err(error) => error_response(error),
    }
}

async fn email_log(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.service.email_log(&QuoteId(id)).await {
        Ok(entries) => Json(entries).into_response(),
        Err(error) => error_response(error),
    }
}
