//! Guarded state machine for the quote lifecycle. The engine decides
//! transitions and prescribes follow-up actions; it never touches
//! persistence or side effects itself. Callers settle lazy expiration
//! before applying any other event, so an overdue quote is flipped to
//! `expired` first and later events report the expiry precisely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::quote::{Quote, QuoteStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEvent {
    Send,
    Open,
    Sign,
    Resend,
    Reject,
    Expire,
}

impl QuoteEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteEvent::Send => "send",
            QuoteEvent::Open => "open",
            QuoteEvent::Sign => "sign",
            QuoteEvent::Resend => "resend",
            QuoteEvent::Reject => "reject",
            QuoteEvent::Expire => "expire",
        }
    }
}

impl fmt::Display for QuoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about the quote at decision time. Guards read these instead
/// of the quote itself so the engine stays a pure function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub already_signed: bool,
    pub document_available: bool,
}

impl TransitionContext {
    pub fn for_quote(quote: &Quote, now: DateTime<Utc>) -> Self {
        Self {
            now,
            expires_at: quote.expires_at,
            already_signed: quote.is_signed(),
            document_available: quote.document_path.is_some(),
        }
    }

    pub fn expired(&self) -> bool {
        self.now > self.expires_at
    }
}

/// What the caller must do after a transition is accepted, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    StampSent,
    StampViewed,
    StampSigned,
    StampRejected,
    StampExpired,
    EnsureDocument,
    NotifyCreated,
    NotifyAccepted,
    NotifyRejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub event: QuoteEvent,
    pub actions: Vec<LifecycleAction>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid transition from {state} using event {event}")]
    InvalidTransition { state: QuoteStatus, event: QuoteEvent },
    #[error("quote expired at {expires_at} and cannot take event {event}")]
    QuoteExpired { event: QuoteEvent, expires_at: DateTime<Utc> },
    #[error("quote is already signed")]
    AlreadySigned,
    #[error("no document is available for this quote")]
    DocumentUnavailable,
    #[error("quote does not expire until {expires_at}")]
    NotExpired { expires_at: DateTime<Utc> },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    pub fn initial_status(&self) -> QuoteStatus {
        QuoteStatus::Draft
    }

    pub fn apply(
        &self,
        current: QuoteStatus,
        event: QuoteEvent,
        context: &TransitionContext,
    ) -> Result<TransitionOutcome, LifecycleError> {
        transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: QuoteStatus,
        event: QuoteEvent,
        context: &TransitionContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, LifecycleError>
    where
        S: AuditSink,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.quote_id.clone(),
                        audit.correlation_id.clone(),
                        "quote.transition_applied",
                        AuditCategory::Lifecycle,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.to_string())
                    .with_metadata("to", outcome.to.to_string())
                    .with_metadata("event", outcome.event.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.quote_id.clone(),
                        audit.correlation_id.clone(),
                        "quote.transition_rejected",
                        AuditCategory::Lifecycle,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("event", event.to_string())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

fn transition(
    current: QuoteStatus,
    event: QuoteEvent,
    context: &TransitionContext,
) -> Result<TransitionOutcome, LifecycleError> {
    use LifecycleAction::{
        EnsureDocument, NotifyAccepted, NotifyCreated, NotifyRejected, StampExpired, StampRejected,
        StampSent, StampSigned, StampViewed,
    };
    use QuoteEvent::{Expire, Open, Reject, Resend, Send, Sign};
    use QuoteStatus::{Accepted, Draft, Expired, Rejected, Sent, Viewed};

    let (to, actions) = match (current, event) {
        (Draft, Send) => {
            if !context.document_available {
                return Err(LifecycleError::DocumentUnavailable);
            }
            (Sent, vec![StampSent])
        }
        (Sent, Open) => {
            ensure_not_expired(event, context)?;
            (Viewed, vec![StampViewed])
        }
        (Sent | Viewed, Sign) => {
            if context.already_signed {
                return Err(LifecycleError::AlreadySigned);
            }
            ensure_not_expired(event, context)?;
            (Accepted, vec![StampSigned, NotifyAccepted])
        }
        (Accepted, Sign) if context.already_signed => {
            return Err(LifecycleError::AlreadySigned);
        }
        (Draft | Sent | Viewed | Rejected, Resend) => {
            ensure_not_expired(event, context)?;
            (Sent, vec![EnsureDocument, StampSent, NotifyCreated])
        }
        (Draft | Sent | Viewed, Reject) => {
            if context.already_signed {
                return Err(LifecycleError::AlreadySigned);
            }
            (Rejected, vec![StampRejected, NotifyRejected])
        }
        (Draft | Sent | Viewed, Expire) => {
            if !context.expired() {
                return Err(LifecycleError::NotExpired { expires_at: context.expires_at });
            }
            (Expired, vec![StampExpired])
        }
        (Expired, Send | Open | Sign | Resend | Reject) => {
            return Err(LifecycleError::QuoteExpired { event, expires_at: context.expires_at });
        }
        _ => {
            return Err(LifecycleError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

fn ensure_not_expired(event: QuoteEvent, context: &TransitionContext) -> Result<(), LifecycleError> {
    if context.expired() {
        return Err(LifecycleError::QuoteExpired { event, expires_at: context.expires_at });
    }
    Ok(())
}
