use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::lifecycle::LifecycleError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote transition from {from} to {to}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid discount: {0}")]
    InvalidDiscount(String),
    #[error("invalid tax rate: {0}")]
    InvalidTaxRate(String),
    #[error("unknown {kind} `{id}`")]
    UnknownCatalogItem { kind: &'static str, id: String },
    #[error("inactive {kind} `{id}` cannot be quoted")]
    InactiveCatalogItem { kind: &'static str, id: String },
    #[error("invalid signature payload: {0}")]
    InvalidSignaturePayload(String),
    #[error("terms must be accepted before signing")]
    TermsNotAccepted,
    #[error("invalid email address `{0}`")]
    InvalidEmailAddress(String),
    #[error("missing required field `{0}`")]
    MissingRequiredField(&'static str),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("document generation failure: {0}")]
    Document(String),
    #[error("notification failure: {0}")]
    Notification(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("gone: {message}")]
    Gone { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested quote could not be found.",
            Self::Conflict { .. } => "The request conflicts with the current state of the quote.",
            Self::Gone { .. } => "This quote has expired and can no longer be signed.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Gone { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Gone { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

/// Transport-code assignment for every error the orchestrator can emit.
/// State conflicts and double-signing are conflicts, expired quotes are
/// gone, infrastructure trouble is retriable, everything else from the
/// domain is the caller's input.
impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(domain) => match domain {
                DomainError::InvalidQuoteTransition { .. }
                | DomainError::Lifecycle(LifecycleError::InvalidTransition { .. })
                | DomainError::Lifecycle(LifecycleError::NotExpired { .. }) => Self::Conflict {
                    message: domain.to_string(),
                    correlation_id: unassigned(),
                },
                DomainError::Lifecycle(LifecycleError::AlreadySigned) => Self::Conflict {
                    message: domain.to_string(),
                    correlation_id: unassigned(),
                },
                DomainError::Lifecycle(LifecycleError::QuoteExpired { .. }) => Self::Gone {
                    message: domain.to_string(),
                    correlation_id: unassigned(),
                },
                DomainError::Lifecycle(LifecycleError::DocumentUnavailable)
                | DomainError::InvariantViolation(_) => Self::Internal {
                    message: domain.to_string(),
                    correlation_id: unassigned(),
                },
                DomainError::InvalidDiscount(_)
                | DomainError::InvalidTaxRate(_)
                | DomainError::UnknownCatalogItem { .. }
                | DomainError::InactiveCatalogItem { .. }
                | DomainError::InvalidSignaturePayload(_)
                | DomainError::TermsNotAccepted
                | DomainError::InvalidEmailAddress(_)
                | DomainError::MissingRequiredField(_) => Self::BadRequest {
                    message: domain.to_string(),
                    correlation_id: unassigned(),
                },
            },
            ApplicationError::NotFound(message) => {
                Self::NotFound { message, correlation_id: unassigned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Notification(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Document(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::QuoteEvent;
    use chrono::{TimeZone, Utc};

    #[test]
    fn invalid_discount_maps_to_bad_request_with_specific_message() {
        let interface = ApplicationError::from(DomainError::InvalidDiscount(
            "fixed discount exceeds the discountable amount".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref message, ref correlation_id }
                if message.contains("fixed discount exceeds") && correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn already_signed_maps_to_conflict() {
        let interface =
            ApplicationError::from(DomainError::Lifecycle(LifecycleError::AlreadySigned))
                .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(
            interface.user_message(),
            "The request conflicts with the current state of the quote."
        );
    }

    #[test]
    fn expired_quote_maps_to_gone() {
        let expires_at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let interface = ApplicationError::from(DomainError::Lifecycle(
            LifecycleError::QuoteExpired { event: QuoteEvent::Sign, expires_at },
        ))
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Gone { .. }));
        assert_eq!(interface.user_message(), "This quote has expired and can no longer be signed.");
    }

    #[test]
    fn missing_quote_maps_to_not_found() {
        let interface =
            ApplicationError::NotFound("quote q-42".to_owned()).into_interface("req-4");

        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref message, .. } if message == "quote q-42"
        ));
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn document_error_maps_to_internal() {
        let interface = ApplicationError::Document("renderer exited with status 1".to_owned())
            .into_interface("req-6");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
        assert_eq!(interface.correlation_id(), "req-6");
    }
}
