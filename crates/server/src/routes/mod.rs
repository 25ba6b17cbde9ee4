//! HTTP surface: the unauthenticated public quote flow and the
//! token-guarded staff API, assembled into one router. Handlers stay
//! thin; they translate between the wire and the service layer and
//! assign each failure a correlation id.

pub mod public;
pub mod staff;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use devisio_core::{ApplicationError, InterfaceError};

use crate::quotes::QuoteService;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<QuoteService>,
    pub staff_token: SecretString,
}

/// Wire shape of every error the API returns.
#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/public/catalog", get(public::catalog_listing))
        .nest("/api/public/quotes", public::router())
        .nest("/api/quotes", staff::router(state.clone()))
        .with_state(state)
}

/// Assigns a correlation id, logs the failure under it, and renders
/// the wire error. Validation and state problems keep their precise
/// message; infrastructure trouble is reduced to a generic one.
pub(crate) fn error_response(error: ApplicationError) -> Response {
    let correlation_id = Uuid::new_v4().simple().to_string();
    warn!(
        event_name = "http.request_failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );
    let interface = error.into_interface(correlation_id.clone());
    let body = ApiError { error: public_message(&interface), correlation_id };
    (status_of(&interface), Json(body)).into_response()
}

fn status_of(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::Gone { .. } => StatusCode::GONE,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(error: &InterfaceError) -> String {
    match error {
        InterfaceError::BadRequest { message, .. }
        | InterfaceError::NotFound { message, .. }
        | InterfaceError::Conflict { message, .. }
        | InterfaceError::Gone { message, .. } => message.clone(),
        InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
            error.user_message().to_owned()
        }
    }
}
