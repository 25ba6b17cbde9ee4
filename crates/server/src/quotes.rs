//! Quote lifecycle orchestration: the service layer both the public
//! signing flow and the staff API call into. Every mutating operation
//! follows the same sequence: guard through the state machine, persist
//! through a conditional update, then run best-effort side effects.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use devisio_core::audit::{AuditContext, AuditEvent, AuditSink};
use devisio_core::config::{AppConfig, CompanyConfig, QuotesConfig};
use devisio_core::pricing::{price, round_money};
use devisio_core::sanitize::{
    clean_client_details, clean_optional, clean_text, MAX_NAME_CHARS, MAX_NOTE_CHARS,
};
use devisio_core::{
    ApplicationError, CatalogListing, ClientDetails, ComplexityLevelId, DesignOptionId, Discount,
    DiscountKind, DomainError, EmailEvent, LifecycleAction, LifecycleEngine, LifecycleError,
    OptionId, OptionSelection, PriceBreakdown, ProjectTypeId, Quote, QuoteConfiguration,
    QuoteEvent, QuoteId, QuoteStatus, SignaturePayload, TransitionContext,
};
use devisio_db::repositories::{
    EmailLogEntry, QuoteListFilter, QuoteStatistics, RepositoryError, SqlCatalogRepository,
    SqlEmailLogRepository, SqlQuoteRepository,
};
use devisio_db::DbPool;

use crate::notify::{EmailAttachment, Notifier};
use crate::pdf::{DocumentLines, PdfGenerator, PdfResult};

/// Forwards lifecycle audit events into the tracing pipeline, which is
/// where every other structured event of this server already goes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            quote_id = ?event.quote_id,
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

/// Client-submitted quote configuration, exactly as the public form
/// posts it. Catalog references arrive as raw ids and are resolved
/// against the live catalog.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateQuoteRequest {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub client_company: Option<String>,
    pub client_address: Option<String>,
    pub project_type_id: String,
    pub design_option_id: String,
    pub complexity_level_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
    pub discount: Option<DiscountRequest>,
    pub tax_rate: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub project_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiscountRequest {
    pub kind: DiscountKind,
    pub value: Decimal,
    pub reason: Option<String>,
}

impl From<DiscountRequest> for Discount {
    fn from(request: DiscountRequest) -> Self {
        Self { kind: request.kind, value: request.value, reason: request.reason }
    }
}

/// Signature submission from the public signing page. The image is a
/// base64 data URL drawn on the client.
#[derive(Clone, Debug, Deserialize)]
pub struct SignQuoteRequest {
    pub signer_name: String,
    pub signature_image: Option<String>,
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RejectQuoteRequest {
    pub reason: Option<String>,
}

/// Client-facing projection: display names instead of catalog ids, and
/// none of the staff-only fields (internal notes, assignee, signer ip).
#[derive(Clone, Debug, Serialize)]
pub struct PublicQuote {
    pub number: String,
    pub status: QuoteStatus,
    pub client: ClientDetails,
    pub project_type: String,
    pub design: String,
    pub complexity: String,
    pub options: Vec<OptionSelection>,
    pub discount: Option<Discount>,
    pub tax_rate: Decimal,
    pub pricing: PriceBreakdown,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub project_description: Option<String>,
    pub company_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub signer_name: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// Outcome of one reminder sweep.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ReminderSweep {
    pub expired: u64,
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct QuoteService {
    quotes: SqlQuoteRepository,
    catalog: SqlCatalogRepository,
    email_log: SqlEmailLogRepository,
    documents: PdfGenerator,
    notifier: Notifier,
    engine: LifecycleEngine,
    audit: Arc<dyn AuditSink>,
    company: CompanyConfig,
    settings: QuotesConfig,
}

impl QuoteService {
    pub fn new(
        pool: DbPool,
        config: &AppConfig,
        documents: PdfGenerator,
        notifier: Notifier,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            quotes: SqlQuoteRepository::new(pool.clone(), config.quotes.number_prefix.clone()),
            catalog: SqlCatalogRepository::new(pool.clone()),
            email_log: SqlEmailLogRepository::new(pool),
            documents,
            notifier,
            engine: LifecycleEngine,
            audit,
            company: config.company.clone(),
            settings: config.quotes.clone(),
        }
    }

    /// Creates a draft from a client-submitted configuration, prices
    /// it, and persists it. Document rendering and the Created email
    /// are best-effort afterwards; when the email goes out the draft is
    /// promoted to Sent. A failed side effect leaves the quote behind
    /// as a draft for a later resend.
    pub async fn create_quote(
        &self,
        request: CreateQuoteRequest,
    ) -> Result<Quote, ApplicationError> {
        let now = Utc::now();
        let client = clean_client_details(
            &request.client_name,
            &request.client_email,
            request.client_phone.as_deref(),
            request.client_company.as_deref(),
            request.client_address.as_deref(),
        )?;

        let configuration = self
            .resolve_configuration(
                &request.project_type_id,
                &request.design_option_id,
                &request.complexity_level_id,
                &request.option_ids,
            )
            .await?;
        configuration.ensure_active()?;

        let discount = request.discount.map(Discount::from);
        let tax_rate = request.tax_rate.unwrap_or(self.settings.default_tax_rate);
        let pricing = price(&configuration, discount.as_ref(), tax_rate)?;

        let mut draft = Quote::new_draft(
            client,
            &configuration,
            discount,
            tax_rate,
            pricing,
            request.start_date,
            self.settings.validity_days,
            now,
        );
        draft.project_description =
            clean_optional(request.project_description.as_deref(), MAX_NOTE_CHARS);

        let mut quote = self.quotes.create(draft).await.map_err(persistence)?;
        info!(
            event_name = "quote.created",
            quote_id = %quote.id,
            number = %quote.number,
            total = %quote.pricing.total,
            "quote created"
        );

        if let Err(error) = self.ensure_document(&mut quote, now).await {
            warn!(
                event_name = "quote.document_failed",
                quote_id = %quote.id,
                error = %error,
                "document generation failed, quote stays draft"
            );
        }

        let attachment = self.stored_pdf_attachment(&quote).await;
        match self.notifier.send_quote_email(&quote, EmailEvent::Created, attachment).await {
            Ok(()) => self.promote_to_sent(&mut quote, now).await,
            Err(error) => {
                warn!(
                    event_name = "quote.notify_failed",
                    quote_id = %quote.id,
                    email_type = %EmailEvent::Created,
                    error = %error,
                    "created email failed, quote stays draft"
                );
            }
        }
        Ok(quote)
    }

    /// Public read by signature token. Settles lazy expiration first,
    /// then records the first open. Both stamps are best-effort; an
    /// expired quote is still returned, with its expired status, so
    /// the signing page can explain itself.
    pub async fn view_quote(&self, token: &str) -> Result<PublicQuote, ApplicationError> {
        let now = Utc::now();
        let mut quote = self.require_by_token(token).await?;
        self.settle_expiry(&mut quote, now).await?;

        if quote.status == QuoteStatus::Sent {
            let context = TransitionContext::for_quote(&quote, now);
            match self.engine.apply_with_audit(
                quote.status,
                QuoteEvent::Open,
                &context,
                &self.audit,
                &self.audit_context(&quote, "public"),
            ) {
                Ok(outcome) => match self.quotes.mark_viewed(&quote.id, now).await {
                    Ok(true) => {
                        quote.status = outcome.to;
                        quote.viewed_at.get_or_insert(now);
                        quote.updated_at = now;
                    }
                    Ok(false) => {}
                    Err(error) => warn!(
                        event_name = "quote.view_stamp_failed",
                        quote_id = %quote.id,
                        error = %error,
                        "viewed_at stamp failed"
                    ),
                },
                Err(error) => warn!(
                    event_name = "quote.open_refused",
                    quote_id = %quote.id,
                    error = %error,
                    "view not recorded"
                ),
            }
        }

        self.public_projection(quote, now).await
    }

    /// Public signing flow. Preconditions run through the state machine
    /// before the payload is even parsed, so an expired quote reports
    /// expiry rather than a payload problem. The double-sign race is
    /// settled by the conditional update; the loser gets the precise
    /// reason from a fresh read.
    pub async fn sign_quote(
        &self,
        token: &str,
        request: SignQuoteRequest,
        client_ip: &str,
    ) -> Result<Quote, ApplicationError> {
        let now = Utc::now();
        let mut quote = self.require_by_token(token).await?;
        self.settle_expiry(&mut quote, now).await?;

        let context = TransitionContext::for_quote(&quote, now);
        self.engine
            .apply_with_audit(
                quote.status,
                QuoteEvent::Sign,
                &context,
                &self.audit,
                &self.audit_context(&quote, "public"),
            )
            .map_err(DomainError::from)?;

        let signer_name = clean_text(&request.signer_name, MAX_NAME_CHARS);
        if signer_name.is_empty() {
            return Err(DomainError::MissingRequiredField("signer_name").into());
        }
        if !request.terms_accepted {
            return Err(DomainError::TermsNotAccepted.into());
        }
        let payload =
            SignaturePayload::parse(request.signature_image.as_deref().unwrap_or_default())?;

        let filename = payload.storage_filename(&quote.number.0);
        let stored = self
            .documents
            .store_signature(&filename, &payload.bytes)
            .await
            .map_err(|error| ApplicationError::Document(error.to_string()))?;
        let signature_path = stored.display().to_string();

        let won = self
            .quotes
            .record_signature(&quote.id, &signer_name, Some(client_ip), Some(&signature_path), now)
            .await
            .map_err(persistence)?;
        if !won {
            let fresh = self.require_by_id(&quote.id).await?;
            return Err(DomainError::from(signature_conflict(&fresh, now)).into());
        }

        let quote = self.require_by_id(&quote.id).await?;
        info!(
            event_name = "quote.signed",
            quote_id = %quote.id,
            number = %quote.number,
            signer = %signer_name,
            "quote signed"
        );

        if let Err(error) =
            self.notifier.send_quote_email(&quote, EmailEvent::Accepted, None).await
        {
            warn!(
                event_name = "quote.notify_failed",
                quote_id = %quote.id,
                email_type = %EmailEvent::Accepted,
                error = %error,
                "acceptance email failed"
            );
        }
        Ok(quote)
    }

    /// Client rejection through the signature link.
    pub async fn reject_by_token(
        &self,
        token: &str,
        request: RejectQuoteRequest,
    ) -> Result<Quote, ApplicationError> {
        let quote = self.require_by_token(token).await?;
        self.reject(quote, request.reason.as_deref(), "public").await
    }

    /// Staff rejection by quote id.
    pub async fn reject_by_id(
        &self,
        id: &QuoteId,
        request: RejectQuoteRequest,
    ) -> Result<Quote, ApplicationError> {
        let quote = self.require_by_id(id).await?;
        self.reject(quote, request.reason.as_deref(), "staff").await
    }

    async fn reject(
        &self,
        mut quote: Quote,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<Quote, ApplicationError> {
        let now = Utc::now();
        self.settle_expiry(&mut quote, now).await?;

        let context = TransitionContext::for_quote(&quote, now);
        self.engine
            .apply_with_audit(
                quote.status,
                QuoteEvent::Reject,
                &context,
                &self.audit,
                &self.audit_context(&quote, actor),
            )
            .map_err(DomainError::from)?;

        let reason = clean_optional(reason, MAX_NOTE_CHARS);
        let changed = self
            .quotes
            .mark_rejected(&quote.id, reason.as_deref(), now)
            .await
            .map_err(persistence)?;
        if !changed {
            let fresh = self.require_by_id(&quote.id).await?;
            return Err(DomainError::InvalidQuoteTransition {
                from: fresh.status,
                to: QuoteStatus::Rejected,
            }
            .into());
        }

        let quote = self.require_by_id(&quote.id).await?;
        info!(
            event_name = "quote.rejected",
            quote_id = %quote.id,
            number = %quote.number,
            "quote rejected"
        );

        if let Err(error) =
            self.notifier.send_quote_email(&quote, EmailEvent::Rejected, None).await
        {
            warn!(
                event_name = "quote.notify_failed",
                quote_id = %quote.id,
                email_type = %EmailEvent::Rejected,
                error = %error,
                "rejection email failed"
            );
        }
        Ok(quote)
    }

    /// Staff resend: back to Sent with a fresh `sent_at` and another
    /// Created email. Unlike creation, a missing document is fatal
    /// here; resending without anything to send would be lying to the
    /// client.
    pub async fn resend_quote(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        let now = Utc::now();
        let mut quote = self.require_by_id(id).await?;
        self.settle_expiry(&mut quote, now).await?;

        let context = TransitionContext::for_quote(&quote, now);
        let outcome = self
            .engine
            .apply_with_audit(
                quote.status,
                QuoteEvent::Resend,
                &context,
                &self.audit,
                &self.audit_context(&quote, "staff"),
            )
            .map_err(DomainError::from)?;

        if outcome.actions.contains(&LifecycleAction::EnsureDocument) {
            self.ensure_document(&mut quote, now).await?;
        }

        if self.quotes.mark_sent(&quote.id, now).await.map_err(persistence)? {
            quote.status = outcome.to;
            quote.sent_at = Some(now);
            quote.updated_at = now;
        } else {
            let fresh = self.require_by_id(&quote.id).await?;
            return Err(DomainError::InvalidQuoteTransition {
                from: fresh.status,
                to: QuoteStatus::Sent,
            }
            .into());
        }

        info!(
            event_name = "quote.resent",
            quote_id = %quote.id,
            number = %quote.number,
            "quote resent"
        );

        let attachment = self.stored_pdf_attachment(&quote).await;
        if let Err(error) =
            self.notifier.send_quote_email(&quote, EmailEvent::Created, attachment).await
        {
            warn!(
                event_name = "quote.notify_failed",
                quote_id = %quote.id,
                email_type = %EmailEvent::Created,
                error = %error,
                "resend email failed"
            );
        }
        Ok(quote)
    }

    /// Copies configuration, client block, discount, tax rate, start
    /// date and description into a brand-new draft, re-priced against
    /// the current catalog rows. Signature data, documents, and
    /// lifecycle timestamps do not carry over.
    pub async fn duplicate_quote(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        let now = Utc::now();
        let source = self.require_by_id(id).await?;

        let option_ids: Vec<String> =
            source.options.iter().map(|selection| selection.option_id.0.clone()).collect();
        let configuration = self
            .resolve_configuration(
                &source.project_type_id.0,
                &source.design_option_id.0,
                &source.complexity_level_id.0,
                &option_ids,
            )
            .await?;

        let pricing = price(&configuration, source.discount.as_ref(), source.tax_rate)?;
        let mut draft = Quote::new_draft(
            source.client.clone(),
            &configuration,
            source.discount.clone(),
            source.tax_rate,
            pricing,
            source.start_date,
            self.settings.validity_days,
            now,
        );
        draft.project_description = source.project_description.clone();

        let duplicate = self.quotes.create(draft).await.map_err(persistence)?;
        info!(
            event_name = "quote.duplicated",
            source_id = %source.id,
            quote_id = %duplicate.id,
            number = %duplicate.number,
            "quote duplicated"
        );
        Ok(duplicate)
    }

    /// Sends the expiry reminder for one quote. The repository-side
    /// dedup keeps it to one successful reminder per quote, so calling
    /// this twice cannot double-remind through the sweep.
    pub async fn remind_quote(&self, quote: &Quote) -> Result<(), ApplicationError> {
        self.notifier
            .send_quote_email(quote, EmailEvent::Reminder, None)
            .await
            .map_err(|error| ApplicationError::Notification(error.to_string()))
    }

    /// The reminder sweep: lazily expires everything overdue, then
    /// sends one Reminder per live quote expiring inside the window.
    /// Individual delivery failures are counted, not fatal.
    pub async fn remind_expiring(
        &self,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<ReminderSweep, ApplicationError> {
        let expired = self.quotes.expire_overdue(now).await.map_err(persistence)?;
        if expired > 0 {
            info!(event_name = "quote.expiry_sweep", count = expired, "overdue quotes expired");
        }

        let deadline = (now + chrono::Duration::days(i64::from(window_days))).date_naive();
        let due = self.quotes.expiring_by(deadline).await.map_err(persistence)?;

        let mut sweep = ReminderSweep { expired, due: due.len(), ..ReminderSweep::default() };
        for quote in &due {
            match self.remind_quote(quote).await {
                Ok(()) => sweep.sent += 1,
                Err(error) => {
                    warn!(
                        event_name = "quote.reminder_failed",
                        quote_id = %quote.id,
                        error = %error,
                        "reminder not delivered"
                    );
                    sweep.failed += 1;
                }
            }
        }
        info!(
            event_name = "quote.reminder_sweep",
            expired = sweep.expired,
            due = sweep.due,
            sent = sweep.sent,
            failed = sweep.failed,
            "reminder sweep finished"
        );
        Ok(sweep)
    }

    /// Staff detail view. Settles lazy expiration, so a stale Sent
    /// quote comes back Expired.
    pub async fn get_quote(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        let now = Utc::now();
        let mut quote = self.require_by_id(id).await?;
        self.settle_expiry(&mut quote, now).await?;
        Ok(quote)
    }

    pub async fn list_quotes(
        &self,
        filter: QuoteListFilter,
    ) -> Result<Vec<Quote>, ApplicationError> {
        self.quotes.list(&filter).await.map_err(persistence)
    }

    /// Active catalog rows for the public configurator form.
    pub async fn catalog_listing(&self) -> Result<CatalogListing, ApplicationError> {
        self.catalog.list_active().await.map_err(persistence)
    }

    pub async fn statistics(&self) -> Result<QuoteStatistics, ApplicationError> {
        self.quotes.statistics(Utc::now()).await.map_err(persistence)
    }

    /// Per-quote email audit trail, newest first.
    pub async fn email_log(&self, id: &QuoteId) -> Result<Vec<EmailLogEntry>, ApplicationError> {
        self.require_by_id(id).await?;
        self.email_log.list_for_quote(id).await.map_err(persistence)
    }

    /// Loads the stored document for download, regenerating it first
    /// when the file went missing from disk.
    pub async fn fetch_document(
        &self,
        id: &QuoteId,
    ) -> Result<(String, PdfResult), ApplicationError> {
        let now = Utc::now();
        let mut quote = self.require_by_id(id).await?;
        self.ensure_document(&mut quote, now).await?;

        let path = quote
            .document_path
            .as_deref()
            .ok_or_else(|| ApplicationError::Document("no document recorded".to_owned()))?;
        let document = self
            .documents
            .load_stored(path)
            .await
            .map_err(|error| ApplicationError::Document(error.to_string()))?;
        let extension = if document.is_pdf() { "pdf" } else { "html" };
        Ok((format!("devis_{}.{}", quote.number, extension), document))
    }

    /// Lazy expiration: any read that finds a live quote past its
    /// deadline flips it before acting further.
    async fn settle_expiry(
        &self,
        quote: &mut Quote,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        if !quote.expiry_due(now) {
            return Ok(());
        }
        let context = TransitionContext::for_quote(quote, now);
        match self.engine.apply_with_audit(
            quote.status,
            QuoteEvent::Expire,
            &context,
            &self.audit,
            &self.audit_context(quote, "system"),
        ) {
            Ok(outcome) => {
                if self.quotes.mark_expired(&quote.id, now).await.map_err(persistence)? {
                    quote.status = outcome.to;
                    quote.updated_at = now;
                    info!(
                        event_name = "quote.expired",
                        quote_id = %quote.id,
                        number = %quote.number,
                        "quote lazily expired"
                    );
                } else if let Some(fresh) =
                    self.quotes.find_by_id(&quote.id).await.map_err(persistence)?
                {
                    // Raced with another writer; trust the database.
                    *quote = fresh;
                }
                Ok(())
            }
            Err(error) => {
                warn!(
                    event_name = "quote.expire_refused",
                    quote_id = %quote.id,
                    error = %error,
                    "expiry not applied"
                );
                Ok(())
            }
        }
    }

    /// Drives draft -> sent after a successful Created delivery. The
    /// engine refuses when no document could be produced; that leaves
    /// the quote a draft for a later resend. Never fatal.
    async fn promote_to_sent(&self, quote: &mut Quote, now: DateTime<Utc>) {
        let context = TransitionContext::for_quote(quote, now);
        match self.engine.apply_with_audit(
            quote.status,
            QuoteEvent::Send,
            &context,
            &self.audit,
            &self.audit_context(quote, "system"),
        ) {
            Ok(outcome) => match self.quotes.mark_sent(&quote.id, now).await {
                Ok(true) => {
                    quote.status = outcome.to;
                    quote.sent_at = Some(now);
                    quote.updated_at = now;
                }
                Ok(false) => {}
                Err(error) => warn!(
                    event_name = "quote.send_stamp_failed",
                    quote_id = %quote.id,
                    error = %error,
                    "sent_at stamp failed"
                ),
            },
            Err(error) => warn!(
                event_name = "quote.send_refused",
                quote_id = %quote.id,
                error = %error,
                "draft not promoted"
            ),
        }
    }

    /// Regenerates and stores the document when none is recorded or the
    /// recorded file is missing. No-op when the stored file exists.
    async fn ensure_document(
        &self,
        quote: &mut Quote,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        if let Some(path) = quote.document_path.as_deref() {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Ok(());
            }
        }

        let lines = self.document_lines(quote).await?;
        let document = self
            .documents
            .generate(quote, &self.company, &lines)
            .await
            .map_err(|error| ApplicationError::Document(error.to_string()))?;
        let stored = self
            .documents
            .persist(&quote.number.0, &document)
            .await
            .map_err(|error| ApplicationError::Document(error.to_string()))?;
        let path = stored.display().to_string();
        self.quotes.update_document_path(&quote.id, &path, now).await.map_err(persistence)?;
        quote.document_path = Some(path);
        quote.updated_at = now;
        Ok(())
    }

    /// The stored PDF as a mail attachment. HTML fallbacks are not
    /// attached; the signature link in the mail body covers that case.
    async fn stored_pdf_attachment(&self, quote: &Quote) -> Option<EmailAttachment> {
        let path = quote.document_path.as_deref()?;
        if !path.ends_with(".pdf") {
            return None;
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(EmailAttachment {
                filename: format!("devis_{}.pdf", quote.number),
                content_type: "application/pdf".to_owned(),
                bytes,
            }),
            Err(error) => {
                warn!(
                    event_name = "quote.attachment_unreadable",
                    quote_id = %quote.id,
                    error = %error,
                    "stored document unreadable, sending without attachment"
                );
                None
            }
        }
    }

    async fn resolve_configuration(
        &self,
        project_type_id: &str,
        design_option_id: &str,
        complexity_level_id: &str,
        option_ids: &[String],
    ) -> Result<QuoteConfiguration, ApplicationError> {
        let project_type = self
            .catalog
            .find_project_type(&ProjectTypeId(project_type_id.to_owned()))
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownCatalogItem {
                kind: "project type",
                id: project_type_id.to_owned(),
            })?;
        let design = self
            .catalog
            .find_design_option(&DesignOptionId(design_option_id.to_owned()))
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownCatalogItem {
                kind: "design option",
                id: design_option_id.to_owned(),
            })?;
        let complexity = self
            .catalog
            .find_complexity_level(&ComplexityLevelId(complexity_level_id.to_owned()))
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownCatalogItem {
                kind: "complexity level",
                id: complexity_level_id.to_owned(),
            })?;

        let mut wanted: Vec<OptionId> = Vec::new();
        for id in option_ids {
            if !wanted.iter().any(|existing| existing.0 == *id) {
                wanted.push(OptionId(id.clone()));
            }
        }
        let options = self.catalog.find_options(&wanted).await.map_err(persistence)?;
        if options.len() != wanted.len() {
            let found: HashSet<&str> = options.iter().map(|option| option.id.0.as_str()).collect();
            if let Some(missing) = wanted.iter().find(|id| !found.contains(id.0.as_str())) {
                return Err(DomainError::UnknownCatalogItem {
                    kind: "supplementary option",
                    id: missing.0.clone(),
                }
                .into());
            }
        }

        Ok(QuoteConfiguration { project_type, design, complexity, options })
    }

    /// Re-resolves the catalog rows referenced by a stored quote into
    /// display lines for documents and projections.
    async fn document_lines(&self, quote: &Quote) -> Result<DocumentLines, ApplicationError> {
        let project_type = self
            .catalog
            .find_project_type(&quote.project_type_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownCatalogItem {
                kind: "project type",
                id: quote.project_type_id.0.clone(),
            })?;
        let design = self
            .catalog
            .find_design_option(&quote.design_option_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownCatalogItem {
                kind: "design option",
                id: quote.design_option_id.0.clone(),
            })?;
        let complexity = self
            .catalog
            .find_complexity_level(&quote.complexity_level_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownCatalogItem {
                kind: "complexity level",
                id: quote.complexity_level_id.0.clone(),
            })?;

        Ok(DocumentLines {
            project_type: project_type.name,
            base_price: project_type.base_price,
            design: design.name,
            design_supplement: design.price_supplement,
            complexity: complexity.name,
            complexity_multiplier: complexity.multiplier,
            core_subtotal: round_money(
                (project_type.base_price + design.price_supplement) * complexity.multiplier,
            ),
            estimated_days: project_type.estimated_days,
        })
    }

    async fn public_projection(
        &self,
        quote: Quote,
        now: DateTime<Utc>,
    ) -> Result<PublicQuote, ApplicationError> {
        let lines = self.document_lines(&quote).await?;
        let end_date = quote.end_date();
        let days_until_expiry = quote.days_until_expiry(now);
        Ok(PublicQuote {
            number: quote.number.0,
            status: quote.status,
            client: quote.client,
            project_type: lines.project_type,
            design: lines.design,
            complexity: lines.complexity,
            options: quote.options,
            discount: quote.discount,
            tax_rate: quote.tax_rate,
            pricing: quote.pricing,
            start_date: quote.start_date,
            end_date,
            project_description: quote.project_description,
            company_name: self.company.name.clone(),
            created_at: quote.created_at,
            expires_at: quote.expires_at,
            days_until_expiry,
            signer_name: quote.signer_name,
            signed_at: quote.signed_at,
            rejection_reason: quote.rejection_reason,
        })
    }

    async fn require_by_id(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.quotes
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("quote {id}")))
    }

    async fn require_by_token(&self, token: &str) -> Result<Quote, ApplicationError> {
        self.quotes
            .find_by_token(token)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                ApplicationError::NotFound("no quote matches this signature link".to_owned())
            })
    }

    fn audit_context(&self, quote: &Quote, actor: &str) -> AuditContext {
        AuditContext::new(
            Some(quote.id.clone()),
            Uuid::new_v4().simple().to_string(),
            actor,
        )
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Pinpoints why a signature CAS lost: someone signed first, the quote
/// expired under the submitter, or a staff action moved it elsewhere.
fn signature_conflict(fresh: &Quote, now: DateTime<Utc>) -> LifecycleError {
    if fresh.is_signed() {
        LifecycleError::AlreadySigned
    } else if fresh.status == QuoteStatus::Expired || fresh.is_expired(now) {
        LifecycleError::QuoteExpired { event: QuoteEvent::Sign, expires_at: fresh.expires_at }
    } else {
        LifecycleError::InvalidTransition { state: fresh.status, event: QuoteEvent::Sign }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::notify::test_support::{FailingMailTransport, RecordingMailTransport};
    use crate::notify::MailTransport;
    use crate::pdf::embedded_templates;
    use devisio_core::audit::InMemoryAuditSink;
    use devisio_db::{connect_with_settings, migrations};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Harness {
        service: QuoteService,
        audit: InMemoryAuditSink,
        pool: DbPool,
        _storage: TempDir,
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("in-memory database should open");
        migrations::run_pending(&pool).await.expect("migrations should apply");
        seed_catalog(&pool).await;
        pool
    }

    async fn seed_catalog(pool: &DbPool) {
        sqlx::query(
            "INSERT INTO project_type (id, name, description, base_price, estimated_days, active) \
             VALUES ('site-vitrine', 'Site Vitrine', '', '2500.00', 10, 1), \
                    ('ecommerce', 'E-commerce', '', '5000.00', 25, 1)",
        )
        .execute(pool)
        .await
        .expect("project type seed");
        sqlx::query(
            "INSERT INTO design_option (id, name, price_supplement, active) \
             VALUES ('moderne', 'Moderne', '800.00', 1), ('retro', 'Rétro', '300.00', 0)",
        )
        .execute(pool)
        .await
        .expect("design option seed");
        sqlx::query(
            "INSERT INTO complexity_level (id, name, multiplier, active) \
             VALUES ('simple', 'Simple', '1.00', 1)",
        )
        .execute(pool)
        .await
        .expect("complexity level seed");
        sqlx::query(
            "INSERT INTO supplementary_option (id, name, description, price, cadence, active) \
             VALUES ('seo', 'Référencement SEO', '', '450.00', 'one_time', 1), \
                    ('hosting', 'Hébergement', '', '25.00', 'monthly', 1)",
        )
        .execute(pool)
        .await
        .expect("option seed");
    }

    fn test_config(storage_dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.company.name = "ZsDevWeb".to_owned();
        config.email.from_email = "devis@zsdevweb.fr".to_owned();
        config.server.frontend_base_url = "https://zsdevweb.fr".to_owned();
        config.documents.storage_dir = storage_dir.to_path_buf();
        // Bogus converter path: conversion fails, rendering falls back
        // to HTML, and the test never shells out.
        config.documents.wkhtmltopdf_path = Some(PathBuf::from("/nonexistent/wkhtmltopdf"));
        config
    }

    async fn harness_with(transport: Arc<dyn MailTransport>) -> Harness {
        let pool = setup_pool().await;
        let storage = TempDir::new().expect("tempdir");
        let config = test_config(storage.path());
        let templates = embedded_templates();
        let documents = PdfGenerator::new(templates.clone(), &config.documents);
        let notifier =
            Notifier::new(templates, transport, SqlEmailLogRepository::new(pool.clone()), &config);
        let audit = InMemoryAuditSink::default();
        let service =
            QuoteService::new(pool.clone(), &config, documents, notifier, Arc::new(audit.clone()));
        Harness { service, audit, pool, _storage: storage }
    }

    async fn recording_harness() -> (Harness, Arc<RecordingMailTransport>) {
        let mailer = Arc::new(RecordingMailTransport::default());
        (harness_with(mailer.clone()).await, mailer)
    }

    fn create_request() -> CreateQuoteRequest {
        CreateQuoteRequest {
            client_name: "Claire Dupont".to_owned(),
            client_email: "claire@example.fr".to_owned(),
            client_phone: Some("+33 6 12 34 56 78".to_owned()),
            client_company: None,
            client_address: None,
            project_type_id: "site-vitrine".to_owned(),
            design_option_id: "moderne".to_owned(),
            complexity_level_id: "simple".to_owned(),
            option_ids: vec!["seo".to_owned()],
            discount: None,
            tax_rate: None,
            start_date: None,
            project_description: Some("Refonte du site vitrine".to_owned()),
        }
    }

    fn signature_data_url() -> String {
        // base64 of "signature-bytes"
        "data:image/png;base64,c2lnbmF0dXJlLWJ5dGVz".to_owned()
    }

    async fn backdate_expiry(pool: &DbPool, id: &QuoteId, expires_at: DateTime<Utc>) {
        sqlx::query("UPDATE quote SET expires_at = ?2 WHERE id = ?1")
            .bind(&id.0)
            .bind(expires_at)
            .execute(pool)
            .await
            .expect("backdate");
    }

    #[tokio::test]
    async fn create_prices_persists_and_promotes_to_sent() {
        let (harness, mailer) = recording_harness().await;

        let quote = harness.service.create_quote(create_request()).await.expect("create");

        assert!(quote.number.0.starts_with("DEVIS-"));
        assert!(quote.number.0.ends_with("-001"));
        // (2500 + 800) * 1.00 + 450 = 3750, default 20% VAT on top.
        assert_eq!(quote.pricing.subtotal, Decimal::new(375_000, 2));
        assert_eq!(quote.pricing.tax_total, Decimal::new(75_000, 2));
        assert_eq!(quote.pricing.total, Decimal::new(450_000, 2));
        assert_eq!(quote.pricing.installments.deposit, Decimal::new(135_000, 2));
        assert_eq!(quote.pricing.installments.midpoint, Decimal::new(180_000, 2));
        assert_eq!(quote.status, QuoteStatus::Sent);
        assert!(quote.sent_at.is_some());

        let path = quote.document_path.as_deref().expect("document stored");
        assert!(path.ends_with(".html"));
        let stored = tokio::fs::read_to_string(path).await.expect("document readable");
        assert!(stored.contains(&quote.number.0));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "claire@example.fr");
        assert!(sent[0].subject.starts_with("Votre devis"));

        let log = harness.service.email_log(&quote.id).await.expect("log");
        assert_eq!(log.len(), 1);
        assert!(log[0].success);

        let promoted = harness
            .audit
            .events()
            .into_iter()
            .find(|event| event.metadata.get("event").map(String::as_str) == Some("send"))
            .expect("send transition audited");
        assert_eq!(promoted.event_type, "quote.transition_applied");
        assert_eq!(promoted.metadata.get("to").map(String::as_str), Some("sent"));
    }

    #[tokio::test]
    async fn create_rejects_unknown_options_without_persisting() {
        let (harness, _mailer) = recording_harness().await;

        let mut request = create_request();
        request.option_ids = vec!["seo".to_owned(), "missing".to_owned()];
        let error = harness.service.create_quote(request).await.unwrap_err();

        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::UnknownCatalogItem {
                kind: "supplementary option",
                id: "missing".to_owned(),
            })
        );
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quote")
            .fetch_one(&harness.pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn create_rejects_inactive_catalog_rows() {
        let (harness, _mailer) = recording_harness().await;

        let mut request = create_request();
        request.design_option_id = "retro".to_owned();
        let error = harness.service.create_quote(request).await.unwrap_err();

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InactiveCatalogItem { kind: "design option", .. })
        ));
    }

    #[tokio::test]
    async fn failed_created_email_leaves_the_quote_draft() {
        let harness = harness_with(Arc::new(FailingMailTransport)).await;

        let quote = harness.service.create_quote(create_request()).await.expect("create");

        assert_eq!(quote.status, QuoteStatus::Draft);
        assert!(quote.sent_at.is_none());
        assert!(quote.document_path.is_some());

        let log = harness.service.email_log(&quote.id).await.expect("log");
        assert_eq!(log.len(), 1);
        assert!(!log[0].success);

        let stored = harness.service.get_quote(&quote.id).await.expect("reload");
        assert_eq!(stored.status, QuoteStatus::Draft);
    }

    #[tokio::test]
    async fn view_marks_sent_quotes_viewed_and_projects_display_names() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");

        let view = harness.service.view_quote(&quote.signature_token.0).await.expect("view");

        assert_eq!(view.status, QuoteStatus::Viewed);
        assert_eq!(view.project_type, "Site Vitrine");
        assert_eq!(view.design, "Moderne");
        assert_eq!(view.complexity, "Simple");
        assert_eq!(view.company_name, "ZsDevWeb");
        assert!((29..=30).contains(&view.days_until_expiry));

        let stored = harness.service.get_quote(&quote.id).await.expect("reload");
        assert_eq!(stored.status, QuoteStatus::Viewed);
        let first_open = stored.viewed_at.expect("viewed_at stamped");

        let again = harness.service.view_quote(&quote.signature_token.0).await.expect("view");
        assert_eq!(again.status, QuoteStatus::Viewed);
        let reloaded = harness.service.get_quote(&quote.id).await.expect("reload");
        assert_eq!(reloaded.viewed_at, Some(first_open));
    }

    #[tokio::test]
    async fn view_lazily_expires_overdue_quotes() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");
        backdate_expiry(&harness.pool, &quote.id, Utc::now() - chrono::Duration::days(2)).await;

        let view = harness.service.view_quote(&quote.signature_token.0).await.expect("view");
        assert_eq!(view.status, QuoteStatus::Expired);

        let stored = harness.service.get_quote(&quote.id).await.expect("reload");
        assert_eq!(stored.status, QuoteStatus::Expired);

        let expired = harness
            .audit
            .events()
            .into_iter()
            .find(|event| event.metadata.get("event").map(String::as_str) == Some("expire"))
            .expect("expire transition audited");
        assert_eq!(expired.event_type, "quote.transition_applied");
        assert_eq!(expired.actor, "system");
    }

    #[tokio::test]
    async fn sign_records_signature_and_sends_confirmation() {
        let (harness, mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");

        let request = SignQuoteRequest {
            signer_name: "  Claire Dupont  ".to_owned(),
            signature_image: Some(signature_data_url()),
            terms_accepted: true,
        };
        let signed = harness
            .service
            .sign_quote(&quote.signature_token.0, request, "203.0.113.9")
            .await
            .expect("sign");

        assert_eq!(signed.status, QuoteStatus::Accepted);
        assert_eq!(signed.signer_name.as_deref(), Some("Claire Dupont"));
        assert_eq!(signed.signer_ip.as_deref(), Some("203.0.113.9"));
        assert!(signed.signed_at.is_some());
        assert!(signed.accepted_at.is_some());

        let signature_path = signed.signature_path.as_deref().expect("signature stored");
        let bytes = tokio::fs::read(signature_path).await.expect("signature readable");
        assert_eq!(bytes, b"signature-bytes");

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.starts_with("Confirmation de signature"));

        let log = harness.service.email_log(&quote.id).await.expect("log");
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn sign_validates_payload_after_the_state_guard() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");
        let token = quote.signature_token.0.clone();

        let no_terms = SignQuoteRequest {
            signer_name: "Claire Dupont".to_owned(),
            signature_image: Some(signature_data_url()),
            terms_accepted: false,
        };
        let error = harness.service.sign_quote(&token, no_terms, "peer").await.unwrap_err();
        assert_eq!(error, ApplicationError::Domain(DomainError::TermsNotAccepted));

        let no_image = SignQuoteRequest {
            signer_name: "Claire Dupont".to_owned(),
            signature_image: None,
            terms_accepted: true,
        };
        let error = harness.service.sign_quote(&token, no_image, "peer").await.unwrap_err();
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidSignaturePayload(_))
        ));

        let no_name = SignQuoteRequest {
            signer_name: "  ".to_owned(),
            signature_image: Some(signature_data_url()),
            terms_accepted: true,
        };
        let error = harness.service.sign_quote(&token, no_name, "peer").await.unwrap_err();
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::MissingRequiredField("signer_name"))
        );

        let stored = harness.service.get_quote(&quote.id).await.expect("reload");
        assert!(stored.signed_at.is_none());
    }

    #[tokio::test]
    async fn second_signature_reports_already_signed() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");
        let token = quote.signature_token.0.clone();

        let request = SignQuoteRequest {
            signer_name: "Claire Dupont".to_owned(),
            signature_image: Some(signature_data_url()),
            terms_accepted: true,
        };
        harness.service.sign_quote(&token, request.clone(), "peer").await.expect("first sign");

        let error = harness.service.sign_quote(&token, request, "peer").await.unwrap_err();
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::AlreadySigned))
        );
    }

    #[tokio::test]
    async fn signing_an_expired_quote_reports_expiry() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");
        backdate_expiry(&harness.pool, &quote.id, Utc::now() - chrono::Duration::hours(1)).await;

        let request = SignQuoteRequest {
            signer_name: "Claire Dupont".to_owned(),
            signature_image: Some(signature_data_url()),
            terms_accepted: true,
        };
        let error = harness
            .service
            .sign_quote(&quote.signature_token.0, request, "peer")
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::QuoteExpired { .. }))
        ));
        let stored = harness.service.get_quote(&quote.id).await.expect("reload");
        assert_eq!(stored.status, QuoteStatus::Expired);
    }

    #[tokio::test]
    async fn reject_by_token_records_reason_and_notifies() {
        let (harness, mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");

        let rejected = harness
            .service
            .reject_by_token(
                &quote.signature_token.0,
                RejectQuoteRequest { reason: Some("Trop cher pour cette année".to_owned()) },
            )
            .await
            .expect("reject");

        assert_eq!(rejected.status, QuoteStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Trop cher pour cette année"));
        assert!(rejected.rejected_at.is_some());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.starts_with("Accusé de réception"));
    }

    #[tokio::test]
    async fn accepted_quotes_cannot_be_rejected() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");

        let request = SignQuoteRequest {
            signer_name: "Claire Dupont".to_owned(),
            signature_image: Some(signature_data_url()),
            terms_accepted: true,
        };
        harness
            .service
            .sign_quote(&quote.signature_token.0, request, "peer")
            .await
            .expect("sign");

        let error = harness
            .service
            .reject_by_id(&quote.id, RejectQuoteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::InvalidTransition {
                state: QuoteStatus::Accepted,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn resend_regenerates_a_missing_document() {
        let (harness, mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");
        let path = quote.document_path.clone().expect("document stored");
        tokio::fs::remove_file(&path).await.expect("remove document");

        let resent = harness.service.resend_quote(&quote.id).await.expect("resend");

        assert_eq!(resent.status, QuoteStatus::Sent);
        let regenerated = resent.document_path.as_deref().expect("document recorded");
        assert!(tokio::fs::try_exists(regenerated).await.expect("stat"));
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn rejected_quotes_can_be_resent() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");
        harness
            .service
            .reject_by_id(&quote.id, RejectQuoteRequest::default())
            .await
            .expect("reject");

        let resent = harness.service.resend_quote(&quote.id).await.expect("resend");
        assert_eq!(resent.status, QuoteStatus::Sent);
        assert!(resent.rejected_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_reprices_against_the_current_catalog() {
        let (harness, _mailer) = recording_harness().await;
        let mut request = create_request();
        request.discount = Some(DiscountRequest {
            kind: DiscountKind::Percent,
            value: Decimal::new(10, 0),
            reason: Some("Client fidèle".to_owned()),
        });
        let source = harness.service.create_quote(request).await.expect("create");

        sqlx::query("UPDATE project_type SET base_price = '3000.00' WHERE id = 'site-vitrine'")
            .execute(&harness.pool)
            .await
            .expect("raise base price");

        let copy = harness.service.duplicate_quote(&source.id).await.expect("duplicate");

        assert_ne!(copy.id, source.id);
        assert_ne!(copy.number, source.number);
        assert_ne!(copy.signature_token, source.signature_token);
        assert_eq!(copy.status, QuoteStatus::Draft);
        assert!(copy.sent_at.is_none());
        assert!(copy.document_path.is_none());
        assert_eq!(copy.client, source.client);
        assert_eq!(copy.discount, source.discount);
        assert_eq!(copy.project_description, source.project_description);
        // (3000 + 800) * 1.00 + 450 = 4250 against the updated catalog.
        assert_eq!(copy.pricing.subtotal, Decimal::new(425_000, 2));
        assert_eq!(copy.pricing.discount_total, Decimal::new(42_500, 2));
    }

    #[tokio::test]
    async fn reminder_sweep_expires_overdue_and_reminds_the_window() {
        let (harness, mailer) = recording_harness().await;

        let inside = harness.service.create_quote(create_request()).await.expect("create");
        backdate_expiry(&harness.pool, &inside.id, Utc::now() + chrono::Duration::days(2)).await;

        let outside = harness.service.create_quote(create_request()).await.expect("create");

        let overdue = harness.service.create_quote(create_request()).await.expect("create");
        backdate_expiry(&harness.pool, &overdue.id, Utc::now() - chrono::Duration::hours(3)).await;

        let sweep = harness.service.remind_expiring(3, Utc::now()).await.expect("sweep");

        assert_eq!(sweep.expired, 1);
        assert_eq!(sweep.due, 1);
        assert_eq!(sweep.sent, 1);
        assert_eq!(sweep.failed, 0);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent[3].subject.contains("expire bientôt"));
        assert_eq!(sent[3].to, "claire@example.fr");

        let flipped = harness.service.get_quote(&overdue.id).await.expect("reload");
        assert_eq!(flipped.status, QuoteStatus::Expired);
        let untouched = harness.service.get_quote(&outside.id).await.expect("reload");
        assert_eq!(untouched.status, QuoteStatus::Sent);

        let second = harness.service.remind_expiring(3, Utc::now()).await.expect("sweep");
        assert_eq!(second.expired, 0);
        assert_eq!(second.due, 0);
    }

    #[tokio::test]
    async fn fetch_document_serves_and_regenerates() {
        let (harness, _mailer) = recording_harness().await;
        let quote = harness.service.create_quote(create_request()).await.expect("create");

        let (filename, document) =
            harness.service.fetch_document(&quote.id).await.expect("fetch");
        assert_eq!(filename, format!("devis_{}.html", quote.number));
        match &document {
            PdfResult::Html(html) => assert!(html.contains(&quote.number.0)),
            PdfResult::Pdf(_) => panic!("conversion should have fallen back to HTML"),
        }

        let path = quote.document_path.clone().expect("document stored");
        tokio::fs::remove_file(&path).await.expect("remove document");
        let (_, regenerated) = harness.service.fetch_document(&quote.id).await.expect("refetch");
        assert!(matches!(regenerated, PdfResult::Html(_)));
    }

    #[tokio::test]
    async fn email_log_requires_an_existing_quote() {
        let (harness, _mailer) = recording_harness().await;

        let error =
            harness.service.email_log(&QuoteId("missing".to_owned())).await.unwrap_err();
        assert!(matches!(error, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_and_statistics_delegate_to_the_repository() {
        let (harness, _mailer) = recording_harness().await;
        harness.service.create_quote(create_request()).await.expect("create");

        let listed = harness
            .service
            .list_quotes(QuoteListFilter { status: Some(QuoteStatus::Sent), ..Default::default() })
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);

        let stats = harness.service.statistics().await.expect("statistics");
        assert_eq!(stats.total_quotes, 1);
        assert_eq!(stats.status_breakdown.get("sent"), Some(&1));
    }
}
