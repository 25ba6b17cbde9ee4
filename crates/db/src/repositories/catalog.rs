//! Read access to the pricing catalog. Writes happen through migrations
//! and the seed fixture; the application itself never mutates catalog
//! rows.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use devisio_core::{
    BillingCadence, CatalogListing, ComplexityLevel, ComplexityLevelId, DesignOption,
    DesignOptionId, OptionId, ProjectType, ProjectTypeId, SupplementaryOption,
};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

#[derive(Clone)]
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Returns every active primitive, ordered for display.
    pub async fn list_active(&self) -> Result<CatalogListing, RepositoryError> {
        let project_types = sqlx::query(
            r#"
            SELECT id, name, description, CAST(base_price AS TEXT) AS base_price_text,
                   estimated_days, active
            FROM project_type
            WHERE active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(project_type_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let design_options = sqlx::query(
            r#"
            SELECT id, name, CAST(price_supplement AS TEXT) AS price_supplement_text, active
            FROM design_option
            WHERE active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(design_option_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let complexity_levels = sqlx::query(
            r#"
            SELECT id, name, CAST(multiplier AS TEXT) AS multiplier_text, active
            FROM complexity_level
            WHERE active = 1
            ORDER BY CAST(multiplier AS REAL)
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(complexity_level_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let options = sqlx::query(
            r#"
            SELECT id, name, description, CAST(price AS TEXT) AS price_text, cadence, active
            FROM supplementary_option
            WHERE active = 1
            ORDER BY cadence, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(option_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(CatalogListing { project_types, design_options, complexity_levels, options })
    }

    pub async fn find_project_type(
        &self,
        id: &ProjectTypeId,
    ) -> Result<Option<ProjectType>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, CAST(base_price AS TEXT) AS base_price_text,
                   estimated_days, active
            FROM project_type
            WHERE id = ?1
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(project_type_from_row).transpose()
    }

    pub async fn find_design_option(
        &self,
        id: &DesignOptionId,
    ) -> Result<Option<DesignOption>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, CAST(price_supplement AS TEXT) AS price_supplement_text, active
            FROM design_option
            WHERE id = ?1
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(design_option_from_row).transpose()
    }

    pub async fn find_complexity_level(
        &self,
        id: &ComplexityLevelId,
    ) -> Result<Option<ComplexityLevel>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, CAST(multiplier AS TEXT) AS multiplier_text, active
            FROM complexity_level
            WHERE id = ?1
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(complexity_level_from_row).transpose()
    }

    /// Fetches the options matching `ids`. Unknown ids are silently
    /// absent from the result; callers diff against their input to
    /// report which reference was bad.
    pub async fn find_options(
        &self,
        ids: &[OptionId],
    ) -> Result<Vec<SupplementaryOption>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, description, CAST(price AS TEXT) AS price_text, cadence, active \
             FROM supplementary_option WHERE id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }

        query.fetch_all(&self.pool).await?.iter().map(option_from_row).collect()
    }
}

fn project_type_from_row(row: &SqliteRow) -> Result<ProjectType, RepositoryError> {
    let base_price_text: String = row.try_get("base_price_text")?;
    Ok(ProjectType {
        id: ProjectTypeId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        base_price: parse_decimal("base_price", &base_price_text)?,
        estimated_days: row.try_get("estimated_days")?,
        active: row.try_get("active")?,
    })
}

fn design_option_from_row(row: &SqliteRow) -> Result<DesignOption, RepositoryError> {
    let supplement_text: String = row.try_get("price_supplement_text")?;
    Ok(DesignOption {
        id: DesignOptionId(row.try_get("id")?),
        name: row.try_get("name")?,
        price_supplement: parse_decimal("price_supplement", &supplement_text)?,
        active: row.try_get("active")?,
    })
}

fn complexity_level_from_row(row: &SqliteRow) -> Result<ComplexityLevel, RepositoryError> {
    let multiplier_text: String = row.try_get("multiplier_text")?;
    Ok(ComplexityLevel {
        id: ComplexityLevelId(row.try_get("id")?),
        name: row.try_get("name")?,
        multiplier: parse_decimal("multiplier", &multiplier_text)?,
        active: row.try_get("active")?,
    })
}

fn option_from_row(row: &SqliteRow) -> Result<SupplementaryOption, RepositoryError> {
    let price_text: String = row.try_get("price_text")?;
    let cadence: String = row.try_get("cadence")?;
    Ok(SupplementaryOption {
        id: OptionId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: parse_decimal("price", &price_text)?,
        cadence: BillingCadence::from_str(&cadence).map_err(RepositoryError::Decode)?,
        active: row.try_get("active")?,
    })
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("column {field} holds invalid decimal `{value}`: {error}"))
    })
}
