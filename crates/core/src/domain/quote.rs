//! Quote aggregate: identity, client data, configuration snapshot,
//! derived financials, and lifecycle timestamps.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::catalog::{
    BillingCadence, ComplexityLevel, ComplexityLevelId, DesignOption, DesignOptionId, OptionId,
    ProjectType, ProjectTypeId, SupplementaryOption,
};
use crate::errors::DomainError;
use crate::pricing::{Discount, PriceBreakdown};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable sequence number (`DEVIS-YYYYMM-NNN`), scoped per
/// calendar month. Assigned by the quote repository when the quote is
/// first persisted; a freshly built draft carries an empty number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteNumber(pub String);

impl fmt::Display for QuoteNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 64-character random hex token. Doubles as the public lookup key and
/// the implicit authorization credential for the signing flow.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureToken(pub String);

impl SignatureToken {
    pub const LENGTH: usize = 64;

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; Self::LENGTH / 2];
        rng.fill(&mut bytes[..]);
        Self(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
    }
}

impl fmt::Display for SignatureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Viewed => "viewed",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Accepted | QuoteStatus::Rejected | QuoteStatus::Expired)
    }

    /// Only drafts accept configuration changes.
    pub fn is_editable(&self) -> bool {
        matches!(self, QuoteStatus::Draft)
    }

    /// Statuses from which the public signing flow may run.
    pub fn is_signable(&self) -> bool {
        matches!(self, QuoteStatus::Sent | QuoteStatus::Viewed)
    }

    pub fn is_resendable(&self) -> bool {
        matches!(
            self,
            QuoteStatus::Draft | QuoteStatus::Sent | QuoteStatus::Viewed | QuoteStatus::Rejected
        )
    }

    /// Statuses that lazily flip to `expired` once past the deadline.
    pub fn can_expire(&self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Sent | QuoteStatus::Viewed)
    }

    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        use QuoteStatus::{Accepted, Draft, Expired, Rejected, Sent, Viewed};

        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Viewed)
                | (Sent, Accepted)
                | (Viewed, Accepted)
                | (Sent, Sent)
                | (Viewed, Sent)
                | (Rejected, Sent)
                | (Draft, Rejected)
                | (Sent, Rejected)
                | (Viewed, Rejected)
                | (Draft, Expired)
                | (Sent, Expired)
                | (Viewed, Expired)
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(QuoteStatus::Draft),
            "sent" => Ok(QuoteStatus::Sent),
            "viewed" => Ok(QuoteStatus::Viewed),
            "accepted" => Ok(QuoteStatus::Accepted),
            "rejected" => Ok(QuoteStatus::Rejected),
            "expired" => Ok(QuoteStatus::Expired),
            other => Err(format!(
                "unsupported quote status `{other}` (expected draft|sent|viewed|accepted|rejected|expired)"
            )),
        }
    }
}

/// Free-text client identity, validated and sanitized at the boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
}

/// Catalog references resolved to full rows, as selected for one quote.
/// The pricing calculator consumes this as its sole configuration input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteConfiguration {
    pub project_type: ProjectType,
    pub design: DesignOption,
    pub complexity: ComplexityLevel,
    pub options: Vec<SupplementaryOption>,
}

impl QuoteConfiguration {
    /// A quote may only reference active primitives at creation time.
    /// Deactivation is not retroactive; existing quotes keep their
    /// stale references.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.project_type.active {
            return Err(DomainError::InactiveCatalogItem {
                kind: "project type",
                id: self.project_type.id.0.clone(),
            });
        }
        if !self.design.active {
            return Err(DomainError::InactiveCatalogItem {
                kind: "design option",
                id: self.design.id.0.clone(),
            });
        }
        if !self.complexity.active {
            return Err(DomainError::InactiveCatalogItem {
                kind: "complexity level",
                id: self.complexity.id.0.clone(),
            });
        }
        for option in &self.options {
            if !option.active {
                return Err(DomainError::InactiveCatalogItem {
                    kind: "supplementary option",
                    id: option.id.0.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn selections(&self) -> Vec<OptionSelection> {
        self.options.iter().map(OptionSelection::from).collect()
    }
}

/// Per-quote snapshot of one selected supplementary option. Keeps the
/// name, price, and cadence as they were when the quote was priced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSelection {
    pub option_id: OptionId,
    pub name: String,
    pub price: Decimal,
    pub cadence: BillingCadence,
}

impl From<&SupplementaryOption> for OptionSelection {
    fn from(option: &SupplementaryOption) -> Self {
        Self {
            option_id: option.id.clone(),
            name: option.name.clone(),
            price: option.price,
            cadence: option.cadence,
        }
    }
}

/// The aggregate root. All mutation goes through the orchestrator, the
/// pricing calculator, and the state machine; derived monetary fields
/// are never hand-edited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub number: QuoteNumber,
    pub status: QuoteStatus,
    pub client: ClientDetails,
    pub project_type_id: ProjectTypeId,
    pub design_option_id: DesignOptionId,
    pub complexity_level_id: ComplexityLevelId,
    pub options: Vec<OptionSelection>,
    pub discount: Option<Discount>,
    pub tax_rate: Decimal,
    pub pricing: PriceBreakdown,
    pub start_date: Option<NaiveDate>,
    pub project_description: Option<String>,
    pub signature_token: SignatureToken,
    pub signer_name: Option<String>,
    pub signer_ip: Option<String>,
    pub signature_path: Option<String>,
    pub document_path: Option<String>,
    pub internal_notes: Option<String>,
    pub assignee: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Builds a fresh draft with a generated id and signature token.
    /// `expires_at` is set once here and never silently extended
    /// afterwards.
    #[allow(clippy::too_many_arguments)]
    pub fn new_draft(
        client: ClientDetails,
        configuration: &QuoteConfiguration,
        discount: Option<Discount>,
        tax_rate: Decimal,
        pricing: PriceBreakdown,
        start_date: Option<NaiveDate>,
        validity_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuoteId::generate(),
            number: QuoteNumber::default(),
            status: QuoteStatus::Draft,
            client,
            project_type_id: configuration.project_type.id.clone(),
            design_option_id: configuration.design.id.clone(),
            complexity_level_id: configuration.complexity.id.clone(),
            options: configuration.selections(),
            discount,
            tax_rate,
            pricing,
            start_date,
            project_description: None,
            signature_token: SignatureToken::generate(),
            signer_name: None,
            signer_ip: None,
            signature_path: None,
            document_path: None,
            internal_notes: None,
            assignee: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            sent_at: None,
            viewed_at: None,
            signed_at: None,
            accepted_at: None,
            rejected_at: None,
            expires_at: now + chrono::Duration::days(i64::from(validity_days)),
        }
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        self.status.can_transition_to(next)
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidQuoteTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// True when the lazy-expiration pass must flip this quote to
    /// `expired` before anything else touches it.
    pub fn expiry_due(&self, now: DateTime<Utc>) -> bool {
        self.status.can_expire() && self.is_expired(now)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.start_date.and_then(|start| {
            start.checked_add_days(Days::new(u64::from(self.pricing.duration_days)))
        })
    }

    /// Whole days until the expiry deadline, floored at zero. Used by
    /// the reminder notification.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::InstallmentPlan;
    use chrono::TimeZone;

    fn breakdown() -> PriceBreakdown {
        PriceBreakdown {
            subtotal: Decimal::new(150_000, 2),
            discount_total: Decimal::ZERO,
            net_total: Decimal::new(150_000, 2),
            tax_total: Decimal::new(30_000, 2),
            total: Decimal::new(180_000, 2),
            installments: InstallmentPlan {
                deposit: Decimal::new(54_000, 2),
                midpoint: Decimal::new(72_000, 2),
                balance: Decimal::new(54_000, 2),
            },
            monthly_total: Decimal::ZERO,
            yearly_total: Decimal::ZERO,
            duration_days: 10,
        }
    }

    fn quote(status: QuoteStatus) -> Quote {
        let now = Utc.with_ymd_and_hms(2026, 2, 24, 9, 0, 0).unwrap();
        Quote {
            id: QuoteId("q-1".to_owned()),
            number: QuoteNumber("DEVIS-202602-001".to_owned()),
            status,
            client: ClientDetails {
                name: "Claire Dupont".to_owned(),
                email: "claire@example.fr".to_owned(),
                phone: None,
                company: None,
                address: None,
            },
            project_type_id: ProjectTypeId("site-vitrine".to_owned()),
            design_option_id: DesignOptionId("design-moderne".to_owned()),
            complexity_level_id: ComplexityLevelId("complexity-simple".to_owned()),
            options: Vec::new(),
            discount: None,
            tax_rate: Decimal::new(2_000, 2),
            pricing: breakdown(),
            start_date: None,
            project_description: None,
            signature_token: SignatureToken("a".repeat(64)),
            signer_name: None,
            signer_ip: None,
            signature_path: None,
            document_path: None,
            internal_notes: None,
            assignee: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            sent_at: None,
            viewed_at: None,
            signed_at: None,
            accepted_at: None,
            rejected_at: None,
            expires_at: now + chrono::Duration::days(30),
        }
    }

    #[test]
    fn draft_moves_to_sent_but_never_straight_to_accepted() {
        let mut draft = quote(QuoteStatus::Draft);
        assert!(draft.can_transition_to(QuoteStatus::Sent));
        assert!(!draft.can_transition_to(QuoteStatus::Accepted));

        draft.transition_to(QuoteStatus::Sent).expect("draft -> sent is legal");
        assert_eq!(draft.status, QuoteStatus::Sent);
    }

    #[test]
    fn terminal_statuses_refuse_further_transitions() {
        for status in [QuoteStatus::Accepted, QuoteStatus::Expired] {
            let mut terminal = quote(status);
            let error = terminal.transition_to(QuoteStatus::Sent).unwrap_err();
            assert_eq!(
                error,
                DomainError::InvalidQuoteTransition { from: status, to: QuoteStatus::Sent }
            );
        }
    }

    #[test]
    fn rejected_quotes_may_be_resent() {
        let mut rejected = quote(QuoteStatus::Rejected);
        rejected.transition_to(QuoteStatus::Sent).expect("rejected -> sent is legal");
        assert_eq!(rejected.status, QuoteStatus::Sent);
    }

    #[test]
    fn status_sets_match_the_lifecycle_table() {
        assert!(QuoteStatus::Draft.is_editable());
        assert!(!QuoteStatus::Sent.is_editable());

        assert!(QuoteStatus::Sent.is_signable());
        assert!(QuoteStatus::Viewed.is_signable());
        assert!(!QuoteStatus::Draft.is_signable());

        assert!(QuoteStatus::Rejected.is_resendable());
        assert!(!QuoteStatus::Accepted.is_resendable());

        assert!(QuoteStatus::Draft.can_expire());
        assert!(!QuoteStatus::Rejected.can_expire());
    }

    #[test]
    fn expiry_is_due_only_for_expirable_statuses_past_deadline() {
        let fresh = quote(QuoteStatus::Sent);
        assert!(!fresh.expiry_due(fresh.created_at));

        let later = fresh.expires_at + chrono::Duration::hours(1);
        assert!(fresh.expiry_due(later));

        let accepted = quote(QuoteStatus::Accepted);
        assert!(!accepted.expiry_due(later));
    }

    #[test]
    fn generated_tokens_are_hex_and_unique() {
        let first = SignatureToken::generate();
        let second = SignatureToken::generate();

        assert_eq!(first.0.len(), SignatureToken::LENGTH);
        assert!(first.0.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(first, second);
    }

    #[test]
    fn end_date_derives_from_start_and_duration() {
        let mut planned = quote(QuoteStatus::Draft);
        planned.start_date = Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(planned.end_date(), Some(NaiveDate::from_ymd_opt(2026, 3, 12).unwrap()));

        planned.start_date = None;
        assert_eq!(planned.end_date(), None);
    }

    #[test]
    fn days_until_expiry_is_floored_at_zero() {
        let sent = quote(QuoteStatus::Sent);
        assert_eq!(sent.days_until_expiry(sent.created_at), 30);
        assert_eq!(sent.days_until_expiry(sent.expires_at + chrono::Duration::days(4)), 0);
    }
}
