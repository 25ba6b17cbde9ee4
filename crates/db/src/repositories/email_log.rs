//! Append-only audit trail of outbound email. Every delivery attempt
//! lands here, failures included; rows are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use devisio_core::notifications::EmailEvent;
use devisio_core::QuoteId;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmailLogEntry {
    pub id: String,
    pub quote_id: QuoteId,
    pub email_type: EmailEvent,
    pub recipient: String,
    pub subject: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SqlEmailLogRepository {
    pool: DbPool,
}

impl SqlEmailLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, entry: &EmailLogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO quote_email_log (
                id, quote_id, email_type, recipient, subject, success, error_message, sent_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.quote_id.0)
        .bind(entry.email_type.as_str())
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(entry.success)
        .bind(entry.error_message.as_deref())
        .bind(entry.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Full history for one quote, newest first.
    pub async fn list_for_quote(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<EmailLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, quote_id, email_type, recipient, subject, success, error_message, sent_at
            FROM quote_email_log
            WHERE quote_id = ?1
            ORDER BY sent_at DESC, rowid DESC
            "#,
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<EmailLogEntry, RepositoryError> {
    let email_type: String = row.try_get("email_type")?;
    Ok(EmailLogEntry {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        email_type: email_type.parse().map_err(RepositoryError::Decode)?,
        recipient: row.try_get("recipient")?,
        subject: row.try_get("subject")?,
        success: row.try_get("success")?,
        error_message: row.try_get("error_message")?,
        sent_at: row.try_get("sent_at")?,
    })
}
