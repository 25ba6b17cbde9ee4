//! Quote persistence. The repository owns two concerns the domain layer
//! cannot: allocating the human-readable sequence number under the
//! unique index, and the compare-and-set updates that keep concurrent
//! lifecycle writes from trampling each other.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use devisio_core::{
    BillingCadence, ClientDetails, ComplexityLevelId, DesignOptionId, Discount, DiscountKind,
    InstallmentPlan, OptionId, OptionSelection, PriceBreakdown, ProjectTypeId, Quote, QuoteId,
    QuoteNumber, QuoteStatus, SignatureToken,
};

use crate::connection::DbPool;
use crate::repositories::catalog::parse_decimal;
use crate::repositories::RepositoryError;

/// Attempts before giving up on number allocation. A collision needs
/// two quotes created in the same month at the same instant, so one
/// retry is almost always enough.
const NUMBER_ATTEMPTS: u32 = 3;

const SELECT_QUOTE: &str = r#"
SELECT id, number, status,
       client_name, client_email, client_phone, client_company, client_address,
       project_type_id, design_option_id, complexity_level_id,
       discount_kind, CAST(discount_value AS TEXT) AS discount_value_text, discount_reason,
       CAST(tax_rate AS TEXT) AS tax_rate_text,
       CAST(subtotal AS TEXT) AS subtotal_text,
       CAST(discount_total AS TEXT) AS discount_total_text,
       CAST(net_total AS TEXT) AS net_total_text,
       CAST(tax_total AS TEXT) AS tax_total_text,
       CAST(total AS TEXT) AS total_text,
       CAST(deposit_amount AS TEXT) AS deposit_amount_text,
       CAST(midpoint_amount AS TEXT) AS midpoint_amount_text,
       CAST(balance_amount AS TEXT) AS balance_amount_text,
       CAST(monthly_total AS TEXT) AS monthly_total_text,
       CAST(yearly_total AS TEXT) AS yearly_total_text,
       duration_days, start_date, project_description, internal_notes, assignee,
       signature_token, signer_name, signer_ip, signature_path, document_path,
       rejection_reason, created_at, updated_at, sent_at, viewed_at, signed_at,
       accepted_at, rejected_at, expires_at
FROM quote
"#;

/// Filter for the staff listing. An empty filter returns every quote,
/// newest first.
#[derive(Clone, Debug, Default)]
pub struct QuoteListFilter {
    pub status: Option<QuoteStatus>,
    pub search: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct SqlQuoteRepository {
    pool: DbPool,
    number_prefix: String,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool, number_prefix: impl Into<String>) -> Self {
        Self { pool, number_prefix: number_prefix.into() }
    }

    /// Persists a fresh draft together with its option snapshots. The
    /// sequence number is allocated here, not by the caller: the unique
    /// index on `number` is the arbiter, and a collision with a
    /// concurrent create simply re-allocates and retries.
    pub async fn create(&self, mut quote: Quote) -> Result<Quote, RepositoryError> {
        for _ in 0..NUMBER_ATTEMPTS {
            quote.number = QuoteNumber(self.next_number(quote.created_at).await?);
            match self.try_insert(&quote).await {
                Ok(()) => return Ok(quote),
                Err(error) if is_number_collision(&error) => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Err(RepositoryError::NumberExhausted { attempts: NUMBER_ATTEMPTS })
    }

    pub async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!("{SELECT_QUOTE} WHERE id = ?1");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!("{SELECT_QUOTE} WHERE signature_token = ?1");
        let row = sqlx::query(&sql).bind(token).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Newest first. The search term matches the quote number and the
    /// client name, email and company; date bounds compare against the
    /// creation day.
    pub async fn list(&self, filter: &QuoteListFilter) -> Result<Vec<Quote>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_QUOTE);
        query.push(" WHERE 1 = 1");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{term}%");
            query.push(" AND (number LIKE ").push_bind(pattern.clone());
            query.push(" OR client_name LIKE ").push_bind(pattern.clone());
            query.push(" OR client_email LIKE ").push_bind(pattern.clone());
            query.push(" OR client_company LIKE ").push_bind(pattern);
            query.push(")");
        }
        if let Some(from) = filter.created_from {
            query.push(" AND DATE(created_at) >= ").push_bind(from);
        }
        if let Some(to) = filter.created_to {
            query.push(" AND DATE(created_at) <= ").push_bind(to);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            quotes.push(self.hydrate(row).await?);
        }
        Ok(quotes)
    }

    /// Flips the quote to `sent` with a fresh `sent_at`; every resend
    /// restamps the timestamp. Returns false when the row was no
    /// longer in a sendable status.
    pub async fn mark_sent(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE quote
            SET status = 'sent', sent_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status IN ('draft', 'sent', 'viewed', 'rejected')
            "#,
        )
        .bind(&id.0)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Records an open and moves `sent` to `viewed`. Repeat opens keep
    /// the original `viewed_at`.
    pub async fn mark_viewed(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE quote
            SET status = CASE WHEN status = 'sent' THEN 'viewed' ELSE status END,
                viewed_at = COALESCE(viewed_at, ?2),
                updated_at = ?2
            WHERE id = ?1 AND status IN ('sent', 'viewed')
            "#,
        )
        .bind(&id.0)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-set acceptance. The `signed_at IS NULL` predicate
    /// makes the database the arbiter between two concurrent signers:
    /// exactly one update matches, the loser sees zero affected rows
    /// and must re-read to find out why.
    pub async fn record_signature(
        &self,
        id: &QuoteId,
        signer_name: &str,
        signer_ip: Option<&str>,
        signature_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE quote
            SET status = 'accepted',
                signer_name = ?2,
                signer_ip = ?3,
                signature_path = ?4,
                signed_at = ?5,
                accepted_at = ?5,
                updated_at = ?5
            WHERE id = ?1 AND status IN ('sent', 'viewed') AND signed_at IS NULL
            "#,
        )
        .bind(&id.0)
        .bind(signer_name)
        .bind(signer_ip)
        .bind(signature_path)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Guarded rejection; a signed quote can no longer be rejected.
    pub async fn mark_rejected(
        &self,
        id: &QuoteId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE quote
            SET status = 'rejected',
                rejection_reason = ?2,
                rejected_at = COALESCE(rejected_at, ?3),
                updated_at = ?3
            WHERE id = ?1 AND status IN ('draft', 'sent', 'viewed') AND signed_at IS NULL
            "#,
        )
        .bind(&id.0)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_expired(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE quote
            SET status = 'expired', updated_at = ?2
            WHERE id = ?1 AND status IN ('draft', 'sent', 'viewed')
            "#,
        )
        .bind(&id.0)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bulk variant of [`mark_expired`](Self::mark_expired) for the
    /// reminder sweep: flips every live quote whose deadline has
    /// passed, and reports how many were flipped.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE quote
            SET status = 'expired', updated_at = ?1
            WHERE status IN ('draft', 'sent', 'viewed') AND expires_at < ?1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_document_path(
        &self,
        id: &QuoteId,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE quote SET document_path = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&id.0)
            .bind(path)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Quotes to remind: live, expiring on or before `deadline`, and
    /// not yet successfully reminded. Failed reminder attempts do not
    /// count, so the next sweep picks those quotes up again.
    pub async fn expiring_by(&self, deadline: NaiveDate) -> Result<Vec<Quote>, RepositoryError> {
        let sql = format!(
            r#"{SELECT_QUOTE}
            WHERE status IN ('sent', 'viewed')
              AND date(expires_at) <= ?1
              AND NOT EXISTS (
                  SELECT 1 FROM quote_email_log log
                  WHERE log.quote_id = quote.id
                    AND log.email_type = 'reminder'
                    AND log.success = 1
              )
            ORDER BY expires_at
            "#
        );
        let rows = sqlx::query(&sql).bind(deadline).fetch_all(&self.pool).await?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            quotes.push(self.hydrate(row).await?);
        }
        Ok(quotes)
    }

    /// Aggregates for the staff dashboard. Amounts are summed in Rust
    /// over the exact decimal column values; sqlite would coerce the
    /// TEXT money columns to floats.
    pub async fn statistics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<QuoteStatistics, RepositoryError> {
        let status_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM quote GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let status_breakdown: BTreeMap<String, i64> = status_rows.into_iter().collect();
        let total_quotes: i64 = status_breakdown.values().sum();

        let totals: Vec<String> = sqlx::query_scalar("SELECT CAST(total AS TEXT) FROM quote")
            .fetch_all(&self.pool)
            .await?;
        let mut total_amount = Decimal::ZERO;
        for text in &totals {
            total_amount += parse_decimal("total", text)?;
        }
        let average_amount = if total_quotes > 0 {
            (total_amount / Decimal::from(total_quotes)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let accepted = status_breakdown.get("accepted").copied().unwrap_or(0);
        let in_flight = status_breakdown.get("sent").copied().unwrap_or(0)
            + status_breakdown.get("viewed").copied().unwrap_or(0);
        let delivered = accepted + in_flight;
        let conversion_rate = if delivered > 0 {
            (Decimal::from(accepted) * Decimal::ONE_HUNDRED / Decimal::from(delivered)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let window_start = now - chrono::Duration::days(365);
        let monthly_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT strftime('%Y-%m', created_at), CAST(total AS TEXT)
            FROM quote
            WHERE created_at >= ?1
            "#,
        )
        .bind(window_start)
        .fetch_all(&self.pool)
        .await?;
        let mut by_month: BTreeMap<String, (i64, Decimal)> = BTreeMap::new();
        for (month, text) in monthly_rows {
            let entry = by_month.entry(month).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += parse_decimal("total", &text)?;
        }
        let quotes_by_month = by_month
            .into_iter()
            .map(|(month, (count, amount))| MonthlyVolume { month, count, amount })
            .collect();

        let type_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT project_type.name, CAST(quote.total AS TEXT)
            FROM quote
            JOIN project_type ON project_type.id = quote.project_type_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let mut by_type: BTreeMap<String, (i64, Decimal)> = BTreeMap::new();
        for (name, text) in type_rows {
            let entry = by_type.entry(name).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += parse_decimal("total", &text)?;
        }
        let mut top_project_types: Vec<ProjectTypeVolume> = by_type
            .into_iter()
            .map(|(name, (count, amount))| ProjectTypeVolume { name, count, amount })
            .collect();
        top_project_types.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        top_project_types.truncate(5);

        Ok(QuoteStatistics {
            total_quotes,
            total_amount,
            average_amount,
            status_breakdown,
            conversion_rate,
            quotes_by_month,
            top_project_types,
        })
    }

    async fn next_number(&self, at: DateTime<Utc>) -> Result<String, RepositoryError> {
        let month = at.format("%Y%m").to_string();
        let like = format!("{}-{}-%", self.number_prefix, month);
        // 1-based substr position of the numeric suffix: prefix, dash,
        // six month digits, dash.
        let suffix_start = (self.number_prefix.len() + month.len() + 3) as i64;

        let highest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(CAST(substr(number, ?1) AS INTEGER)) FROM quote WHERE number LIKE ?2",
        )
        .bind(suffix_start)
        .bind(&like)
        .fetch_one(&self.pool)
        .await?;

        Ok(format!("{}-{}-{:03}", self.number_prefix, month, highest.unwrap_or(0) + 1))
    }

    async fn try_insert(&self, quote: &Quote) -> Result<(), sqlx::Error> {
        let discount_kind = quote.discount.as_ref().map(|discount| discount.kind.as_str());
        let discount_value = quote.discount.as_ref().map(|discount| discount.value.to_string());
        let discount_reason =
            quote.discount.as_ref().and_then(|discount| discount.reason.as_deref());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO quote (
                id, number, status,
                client_name, client_email, client_phone, client_company, client_address,
                project_type_id, design_option_id, complexity_level_id,
                discount_kind, discount_value, discount_reason,
                tax_rate, subtotal, discount_total, net_total, tax_total, total,
                deposit_amount, midpoint_amount, balance_amount, monthly_total, yearly_total,
                duration_days, start_date, project_description, internal_notes, assignee,
                signature_token, signer_name, signer_ip, signature_path, document_path,
                rejection_reason, created_at, updated_at,
                sent_at, viewed_at, signed_at, accepted_at, rejected_at, expires_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28,
                ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40, ?41,
                ?42, ?43, ?44
            )
            "#,
        )
        .bind(&quote.id.0)
        .bind(&quote.number.0)
        .bind(quote.status.as_str())
        .bind(&quote.client.name)
        .bind(&quote.client.email)
        .bind(quote.client.phone.as_deref())
        .bind(quote.client.company.as_deref())
        .bind(quote.client.address.as_deref())
        .bind(&quote.project_type_id.0)
        .bind(&quote.design_option_id.0)
        .bind(&quote.complexity_level_id.0)
        .bind(discount_kind)
        .bind(discount_value)
        .bind(discount_reason)
        .bind(quote.tax_rate.to_string())
        .bind(quote.pricing.subtotal.to_string())
        .bind(quote.pricing.discount_total.to_string())
        .bind(quote.pricing.net_total.to_string())
        .bind(quote.pricing.tax_total.to_string())
        .bind(quote.pricing.total.to_string())
        .bind(quote.pricing.installments.deposit.to_string())
        .bind(quote.pricing.installments.midpoint.to_string())
        .bind(quote.pricing.installments.balance.to_string())
        .bind(quote.pricing.monthly_total.to_string())
        .bind(quote.pricing.yearly_total.to_string())
        .bind(quote.pricing.duration_days)
        .bind(quote.start_date)
        .bind(quote.project_description.as_deref())
        .bind(quote.internal_notes.as_deref())
        .bind(quote.assignee.as_deref())
        .bind(&quote.signature_token.0)
        .bind(quote.signer_name.as_deref())
        .bind(quote.signer_ip.as_deref())
        .bind(quote.signature_path.as_deref())
        .bind(quote.document_path.as_deref())
        .bind(quote.rejection_reason.as_deref())
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .bind(quote.sent_at)
        .bind(quote.viewed_at)
        .bind(quote.signed_at)
        .bind(quote.accepted_at)
        .bind(quote.rejected_at)
        .bind(quote.expires_at)
        .execute(&mut *tx)
        .await?;

        for selection in &quote.options {
            sqlx::query(
                r#"
                INSERT INTO quote_option (quote_id, option_id, name, price, cadence)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&quote.id.0)
            .bind(&selection.option_id.0)
            .bind(&selection.name)
            .bind(selection.price.to_string())
            .bind(selection.cadence.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Quote, RepositoryError> {
        let mut quote = quote_from_row(row)?;
        quote.options = self.load_options(&quote.id).await?;
        Ok(quote)
    }

    async fn load_options(&self, id: &QuoteId) -> Result<Vec<OptionSelection>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT option_id, name, CAST(price AS TEXT) AS price_text, cadence
            FROM quote_option
            WHERE quote_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let price_text: String = row.try_get("price_text")?;
                let cadence: String = row.try_get("cadence")?;
                Ok(OptionSelection {
                    option_id: OptionId(row.try_get("option_id")?),
                    name: row.try_get("name")?,
                    price: parse_decimal("price", &price_text)?,
                    cadence: BillingCadence::from_str(&cadence).map_err(RepositoryError::Decode)?,
                })
            })
            .collect()
    }
}

/// Staff dashboard aggregates.
#[derive(Clone, Debug, Serialize)]
pub struct QuoteStatistics {
    pub total_quotes: i64,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub status_breakdown: BTreeMap<String, i64>,
    /// Accepted share of everything delivered to clients, in percent.
    pub conversion_rate: Decimal,
    pub quotes_by_month: Vec<MonthlyVolume>,
    pub top_project_types: Vec<ProjectTypeVolume>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonthlyVolume {
    pub month: String,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProjectTypeVolume {
    pub name: String,
    pub count: i64,
    pub amount: Decimal,
}

fn is_number_collision(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => {
            db_error.is_unique_violation() && db_error.message().contains("quote.number")
        }
        _ => false,
    }
}

fn quote_from_row(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let status_text: String = row.try_get("status")?;
    let status = QuoteStatus::from_str(&status_text).map_err(RepositoryError::Decode)?;

    let discount_kind: Option<String> = row.try_get("discount_kind")?;
    let discount = match discount_kind {
        Some(kind_text) => {
            let kind = DiscountKind::from_str(&kind_text).map_err(RepositoryError::Decode)?;
            let value_text: Option<String> = row.try_get("discount_value_text")?;
            let value_text = value_text.ok_or_else(|| {
                RepositoryError::Decode("discount_kind is set but discount_value is NULL".to_owned())
            })?;
            Some(Discount {
                kind,
                value: parse_decimal("discount_value", &value_text)?,
                reason: row.try_get("discount_reason")?,
            })
        }
        None => None,
    };

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        number: QuoteNumber(row.try_get("number")?),
        status,
        client: ClientDetails {
            name: row.try_get("client_name")?,
            email: row.try_get("client_email")?,
            phone: row.try_get("client_phone")?,
            company: row.try_get("client_company")?,
            address: row.try_get("client_address")?,
        },
        project_type_id: ProjectTypeId(row.try_get("project_type_id")?),
        design_option_id: DesignOptionId(row.try_get("design_option_id")?),
        complexity_level_id: ComplexityLevelId(row.try_get("complexity_level_id")?),
        options: Vec::new(),
        discount,
        tax_rate: decimal_column(row, "tax_rate_text", "tax_rate")?,
        pricing: PriceBreakdown {
            subtotal: decimal_column(row, "subtotal_text", "subtotal")?,
            discount_total: decimal_column(row, "discount_total_text", "discount_total")?,
            net_total: decimal_column(row, "net_total_text", "net_total")?,
            tax_total: decimal_column(row, "tax_total_text", "tax_total")?,
            total: decimal_column(row, "total_text", "total")?,
            installments: InstallmentPlan {
                deposit: decimal_column(row, "deposit_amount_text", "deposit_amount")?,
                midpoint: decimal_column(row, "midpoint_amount_text", "midpoint_amount")?,
                balance: decimal_column(row, "balance_amount_text", "balance_amount")?,
            },
            monthly_total: decimal_column(row, "monthly_total_text", "monthly_total")?,
            yearly_total: decimal_column(row, "yearly_total_text", "yearly_total")?,
            duration_days: row.try_get("duration_days")?,
        },
        start_date: row.try_get("start_date")?,
        project_description: row.try_get("project_description")?,
        signature_token: SignatureToken(row.try_get("signature_token")?),
        signer_name: row.try_get("signer_name")?,
        signer_ip: row.try_get("signer_ip")?,
        signature_path: row.try_get("signature_path")?,
        document_path: row.try_get("document_path")?,
        internal_notes: row.try_get("internal_notes")?,
        assignee: row.try_get("assignee")?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        sent_at: row.try_get("sent_at")?,
        viewed_at: row.try_get("viewed_at")?,
        signed_at: row.try_get("signed_at")?,
        accepted_at: row.try_get("accepted_at")?,
        rejected_at: row.try_get("rejected_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn decimal_column(row: &SqliteRow, alias: &str, field: &str) -> Result<Decimal, RepositoryError> {
    let text: String = row.try_get(alias)?;
    parse_decimal(field, &text)
}
