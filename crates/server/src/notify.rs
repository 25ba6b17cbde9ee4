//! Outbound quote email: rendering, delivery, and the audit trail.
//!
//! Delivery goes through the `MailTransport` trait so the SMTP path can
//! be swapped for a logging transport in development and for recording
//! doubles in tests. Whatever the transport outcome, every attempt
//! appends exactly one `quote_email_log` row before the result is
//! handed back to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use devisio_core::config::{AppConfig, CompanyConfig, EmailConfig, EmailDriver, SmtpTls};
use devisio_core::notifications::TEXT_FALLBACK_BODY;
use devisio_core::{EmailEvent, Quote};
use devisio_db::repositories::{EmailLogEntry, SqlEmailLogRepository};
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tera::{Context, Tera};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("template error: {0}")]
    Template(String),
    #[error("invalid email address: {0}")]
    Address(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("email log write failed: {0}")]
    Log(String),
}

/// One fully prepared outbound message, transport-agnostic.
#[derive(Clone, Debug)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

#[derive(Clone, Debug)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, from: &str, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

/// Production transport over lettre's async SMTP client.
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn new(email: &EmailConfig) -> Result<Self, NotifyError> {
        let mut builder = match email.smtp_tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&email.smtp_host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?,
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&email.smtp_host)
                    .map_err(|e| NotifyError::Transport(e.to_string()))?
            }
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&email.smtp_host)
            }
        };

        builder = builder
            .port(email.smtp_port)
            .timeout(Some(Duration::from_secs(email.timeout_secs)));

        if let (Some(username), Some(password)) = (&email.smtp_username, &email.smtp_password) {
            builder = builder
                .credentials(Credentials::new(username.clone(), password.expose_secret().to_string()));
        }

        Ok(Self { transport: builder.build() })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, from: &str, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let message = build_message(from, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Development transport: logs instead of delivering. Selected by the
/// `log` email driver.
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, from: &str, email: &OutgoingEmail) -> Result<(), NotifyError> {
        info!(
            event_name = "email.log_driver",
            from = %from,
            to = %email.to,
            subject = %email.subject,
            has_attachment = email.attachment.is_some(),
            "email driver is `log`, message not delivered"
        );
        Ok(())
    }
}

/// Assemble the multipart MIME message: text fallback plus HTML, with
/// the quote PDF attached when one is supplied.
fn build_message(from: &str, email: &OutgoingEmail) -> Result<Message, NotifyError> {
    let from_mailbox: Mailbox =
        from.parse().map_err(|_| NotifyError::Address(from.to_string()))?;
    let to_mailbox: Mailbox =
        email.to.parse().map_err(|_| NotifyError::Address(email.to.clone()))?;

    let alternative =
        MultiPart::alternative_plain_html(email.text_body.clone(), email.html_body.clone());

    let body = match &email.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                NotifyError::Transport(format!("invalid attachment content type: {e}"))
            })?;
            MultiPart::mixed().multipart(alternative).singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.bytes.clone(), content_type),
            )
        }
        None => alternative,
    };

    Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(&email.subject)
        .multipart(body)
        .map_err(|e| NotifyError::Transport(e.to_string()))
}

/// Renders and sends quote emails, writing the audit trail on the way
/// out.
pub struct Notifier {
    templates: Arc<Tera>,
    transport: Arc<dyn MailTransport>,
    email_log: SqlEmailLogRepository,
    company: CompanyConfig,
    from_email: String,
    frontend_base_url: String,
}

impl Notifier {
    pub fn new(
        templates: Arc<Tera>,
        transport: Arc<dyn MailTransport>,
        email_log: SqlEmailLogRepository,
        config: &AppConfig,
    ) -> Self {
        Self {
            templates,
            transport,
            email_log,
            company: config.company.clone(),
            from_email: config.email.from_email.clone(),
            frontend_base_url: config.server.frontend_base_url.clone(),
        }
    }

    /// Pick the transport matching the configured email driver.
    pub fn transport_from_config(email: &EmailConfig) -> Result<Arc<dyn MailTransport>, NotifyError> {
        match email.driver {
            EmailDriver::Smtp => Ok(Arc::new(SmtpMailTransport::new(email)?)),
            EmailDriver::Log => Ok(Arc::new(LogMailTransport)),
        }
    }

    /// Send one lifecycle email for a quote.
    ///
    /// The `quote_email_log` row is appended whether delivery succeeded
    /// or not; only after the row is durable does the outcome reach the
    /// caller. A failed audit write beats a successful delivery.
    pub async fn send_quote_email(
        &self,
        quote: &Quote,
        event: EmailEvent,
        attachment: Option<EmailAttachment>,
    ) -> Result<(), NotifyError> {
        let subject = event.subject(&quote.number.0, &self.company.name);
        let outcome = self.deliver(quote, event, &subject, attachment).await;

        let entry = EmailLogEntry {
            id: Uuid::new_v4().simple().to_string(),
            quote_id: quote.id.clone(),
            email_type: event,
            recipient: quote.client.email.clone(),
            subject: subject.clone(),
            success: outcome.is_ok(),
            error_message: outcome.as_ref().err().map(|e| e.to_string()),
            sent_at: Utc::now(),
        };
        if let Err(e) = self.email_log.append(&entry).await {
            error!(
                event_name = "email.audit_write_failed",
                quote_id = %quote.id,
                email_type = %event,
                error = %e,
                "failed to record email attempt"
            );
            return Err(NotifyError::Log(e.to_string()));
        }

        match &outcome {
            Ok(()) => info!(
                event_name = "email.sent",
                quote_id = %quote.id,
                email_type = %event,
                recipient = %quote.client.email,
                "quote email delivered"
            ),
            Err(e) => warn!(
                event_name = "email.delivery_failed",
                quote_id = %quote.id,
                email_type = %event,
                recipient = %quote.client.email,
                error = %e,
                "quote email delivery failed"
            ),
        }

        outcome
    }

    async fn deliver(
        &self,
        quote: &Quote,
        event: EmailEvent,
        subject: &str,
        attachment: Option<EmailAttachment>,
    ) -> Result<(), NotifyError> {
        let html_body = self.render_body(quote, event)?;
        let email = OutgoingEmail {
            to: quote.client.email.clone(),
            subject: subject.to_string(),
            text_body: TEXT_FALLBACK_BODY.to_string(),
            html_body,
            attachment,
        };
        self.transport.send(&self.from_email, &email).await
    }

    fn render_body(&self, quote: &Quote, event: EmailEvent) -> Result<String, NotifyError> {
        let now = Utc::now();

        let mut context = Context::new();
        context.insert("quote", quote);
        context.insert("client", &quote.client);
        context.insert(
            "company",
            &serde_json::json!({
                "name": self.company.name,
                "email": self.company.email,
                "phone": self.company.phone,
                "footer_text": self.company.footer_text,
                "email_signature": self.company.email_signature,
            }),
        );
        context.insert("signature_link", &self.signature_link(quote));
        context.insert("current_year", &now.year());
        if event == EmailEvent::Reminder {
            context.insert("days_remaining", &quote.days_until_expiry(now));
        }

        self.templates
            .render(event.template_name(), &context)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    fn signature_link(&self, quote: &Quote) -> String {
        format!(
            "{}/signature/{}",
            self.frontend_base_url.trim_end_matches('/'),
            quote.signature_token.0
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FailingMailTransport, RecordingMailTransport};
    use super::*;
    use crate::pdf::embedded_templates;
    use chrono::{DateTime, Duration as ChronoDuration};
    use devisio_core::{
        ClientDetails, ComplexityLevelId, DesignOptionId, InstallmentPlan, PriceBreakdown,
        ProjectTypeId, QuoteId, QuoteNumber, QuoteStatus, SignatureToken,
    };
    use devisio_db::{connect_with_settings, migrations, DbPool};
    use rust_decimal::Decimal;

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("in-memory database should open");
        migrations::run_pending(&pool).await.expect("migrations should apply");

        sqlx::query(
            "INSERT INTO project_type (id, name, description, base_price, estimated_days, active) \
             VALUES ('site-vitrine', 'Site Vitrine', '', '2500.00', 10, 1)",
        )
        .execute(&pool)
        .await
        .expect("project type seed");
        sqlx::query(
            "INSERT INTO design_option (id, name, price_supplement, active) \
             VALUES ('moderne', 'Moderne', '800.00', 1)",
        )
        .execute(&pool)
        .await
        .expect("design option seed");
        sqlx::query(
            "INSERT INTO complexity_level (id, name, multiplier, active) \
             VALUES ('simple', 'Simple', '1.00', 1)",
        )
        .execute(&pool)
        .await
        .expect("complexity level seed");
        pool
    }

    async fn insert_quote_row(pool: &DbPool, quote: &Quote) {
        sqlx::query(
            r#"
            INSERT INTO quote (
                id, number, status, client_name, client_email,
                project_type_id, design_option_id, complexity_level_id,
                tax_rate, subtotal, discount_total, net_total, tax_total, total,
                deposit_amount, midpoint_amount, balance_amount, monthly_total, yearly_total,
                duration_days, signature_token, created_at, updated_at, expires_at
            ) VALUES (
                ?1, ?2, 'sent', ?3, ?4,
                'site-vitrine', 'moderne', 'simple',
                '20.00', '1500.00', '0.00', '1500.00', '300.00', '1800.00',
                '540.00', '720.00', '540.00', '0.00', '0.00',
                10, ?5, ?6, ?6, ?7
            )
            "#,
        )
        .bind(&quote.id.0)
        .bind(&quote.number.0)
        .bind(&quote.client.name)
        .bind(&quote.client.email)
        .bind(&quote.signature_token.0)
        .bind(quote.created_at)
        .bind(quote.expires_at)
        .execute(pool)
        .await
        .expect("quote insert should succeed");
    }

    fn quote(expires_at: DateTime<Utc>) -> Quote {
        let now = expires_at - ChronoDuration::days(30);
        Quote {
            id: QuoteId("q-mail-1".to_string()),
            number: QuoteNumber("DEVIS-202602-001".to_string()),
            status: QuoteStatus::Sent,
            client: ClientDetails {
                name: "Claire Dupont".to_string(),
                email: "claire@example.fr".to_string(),
                phone: None,
                company: None,
                address: None,
            },
            project_type_id: ProjectTypeId("site-vitrine".to_string()),
            design_option_id: DesignOptionId("moderne".to_string()),
            complexity_level_id: ComplexityLevelId("simple".to_string()),
            options: Vec::new(),
            discount: None,
            tax_rate: Decimal::new(2_000, 2),
            pricing: PriceBreakdown {
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
            },
            start_date: None,
            project_description: None,
            signature_token: SignatureToken("b".repeat(64)),
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
            expires_at,
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.company.name = "ZsDevWeb".to_string();
        config.email.from_email = "devis@zsdevweb.fr".to_string();
        config.server.frontend_base_url = "https://zsdevweb.fr/".to_string();
        config
    }

    fn notifier(pool: &DbPool, transport: Arc<dyn MailTransport>) -> Notifier {
        Notifier::new(
            embedded_templates(),
            transport,
            SqlEmailLogRepository::new(pool.clone()),
            &test_config(),
        )
    }

    #[tokio::test]
    async fn created_email_renders_signature_link_and_logs_success() {
        let pool = setup_pool().await;
        let quote = quote(Utc::now() + ChronoDuration::days(30));
        insert_quote_row(&pool, &quote).await;

        let transport = Arc::new(RecordingMailTransport::default());
        let notifier = notifier(&pool, transport.clone());

        notifier
            .send_quote_email(&quote, EmailEvent::Created, None)
            .await
            .expect("delivery should succeed");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "claire@example.fr");
        assert!(sent[0].subject.starts_with("Votre devis DEVIS-202602-001"));
        assert!(sent[0].html_body.contains(&format!("/signature/{}", quote.signature_token.0)));
        assert_eq!(sent[0].text_body, TEXT_FALLBACK_BODY);

        let history = SqlEmailLogRepository::new(pool.clone())
            .list_for_quote(&quote.id)
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
        assert!(history[0].success);
        assert_eq!(history[0].email_type, EmailEvent::Created);
        pool.close().await;
    }

    #[tokio::test]
    async fn failed_delivery_still_appends_exactly_one_log_row() {
        let pool = setup_pool().await;
        let quote = quote(Utc::now() + ChronoDuration::days(30));
        insert_quote_row(&pool, &quote).await;

        let notifier = notifier(&pool, Arc::new(FailingMailTransport));

        let result = notifier.send_quote_email(&quote, EmailEvent::Created, None).await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));

        let history = SqlEmailLogRepository::new(pool.clone())
            .list_for_quote(&quote.id)
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        assert_eq!(history[0].error_message.as_deref(), Some("transport error: connection refused"));
        pool.close().await;
    }

    #[tokio::test]
    async fn reminder_email_carries_days_remaining() {
        let pool = setup_pool().await;
        let quote = quote(Utc::now() + ChronoDuration::days(3) + ChronoDuration::hours(2));
        insert_quote_row(&pool, &quote).await;

        let transport = Arc::new(RecordingMailTransport::default());
        let notifier = notifier(&pool, transport.clone());

        notifier
            .send_quote_email(&quote, EmailEvent::Reminder, None)
            .await
            .expect("delivery should succeed");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("expire bientôt"));
        assert!(sent[0].html_body.contains("3 jour"));
        pool.close().await;
    }

    #[tokio::test]
    async fn created_attachment_reaches_the_transport() {
        let pool = setup_pool().await;
        let quote = quote(Utc::now() + ChronoDuration::days(30));
        insert_quote_row(&pool, &quote).await;

        let transport = Arc::new(RecordingMailTransport::default());
        let notifier = notifier(&pool, transport.clone());

        let attachment = EmailAttachment {
            filename: "devis_DEVIS-202602-001.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4 stub".to_vec(),
        };
        notifier
            .send_quote_email(&quote, EmailEvent::Created, Some(attachment))
            .await
            .expect("delivery should succeed");

        let sent = transport.sent();
        let attached = sent[0].attachment.as_ref().expect("attachment should survive");
        assert_eq!(attached.filename, "devis_DEVIS-202602-001.pdf");
        assert_eq!(attached.content_type, "application/pdf");
        pool.close().await;
    }

    #[test]
    fn message_builds_with_and_without_attachment() {
        let plain = OutgoingEmail {
            to: "claire@example.fr".to_string(),
            subject: "Votre devis".to_string(),
            text_body: TEXT_FALLBACK_BODY.to_string(),
            html_body: "<p>devis</p>".to_string(),
            attachment: None,
        };
        build_message("devis@zsdevweb.fr", &plain).expect("plain message should build");

        let with_attachment = OutgoingEmail {
            attachment: Some(EmailAttachment {
                filename: "devis.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: vec![1, 2, 3],
            }),
            ..plain
        };
        let message =
            build_message("devis@zsdevweb.fr", &with_attachment).expect("mixed message");
        let formatted = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("devis.pdf"));

        let bad = OutgoingEmail { to: "not-an-address".to_string(), ..with_attachment };
        assert!(matches!(
            build_message("devis@zsdevweb.fr", &bad),
            Err(NotifyError::Address(_))
        ));
    }
}
