//! Seedable starter catalog and its verification contract. The fixture
//! is what `devisio seed` loads into a fresh database and what the
//! doctor command checks against.

use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_PROJECT_TYPE_IDS: &[&str] = &[
    "site-vitrine",
    "landing-page",
    "portfolio",
    "blog",
    "ecommerce",
    "application-web",
    "marketplace",
    "saas",
];

const SEED_DESIGN_OPTION_IDS: &[&str] = &["simple", "moderne", "premium", "sur-mesure"];

const SEED_COMPLEXITY_LEVEL_IDS: &[&str] = &["simple", "intermediaire", "avance", "expert"];

const SEED_OPTION_IDS: &[&str] = &[
    "seo-base",
    "seo-avance",
    "redaction-contenu",
    "migration-donnees",
    "formation-admin",
    "logo-identite",
    "photos-pro",
    "multilingue",
    "paiement-en-ligne",
    "module-blog",
    "module-newsletter",
    "module-reservation",
    "espace-membre",
    "chat-en-ligne",
    "analytics-setup",
    "hebergement-standard",
    "hebergement-premium",
    "maintenance-standard",
    "maintenance-premium",
    "seo-suivi",
    "nom-domaine",
    "certificat-ssl",
];

/// Starter pricing catalog for a new installation.
///
/// Loading is idempotent: the fixture only inserts rows that are not
/// already present, so it is safe against a live database.
pub struct CatalogSeed;

impl CatalogSeed {
    /// SQL fixture content for the starter catalog.
    pub const SQL: &str = include_str!("../../../config/fixtures/catalog_seed.sql");

    /// Loads the starter catalog and reports how many of the seeded
    /// rows are present afterwards.
    pub async fn load(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedSummary {
            project_types: count_seeded(pool, "project_type", SEED_PROJECT_TYPE_IDS).await?,
            design_options: count_seeded(pool, "design_option", SEED_DESIGN_OPTION_IDS).await?,
            complexity_levels: count_seeded(pool, "complexity_level", SEED_COMPLEXITY_LEVEL_IDS)
                .await?,
            options: count_seeded(pool, "supplementary_option", SEED_OPTION_IDS).await?,
        })
    }

    /// Verifies that the seeded catalog matches the contract the
    /// pricing flow depends on.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (label, table, ids) in [
            ("project-types", "project_type", SEED_PROJECT_TYPE_IDS),
            ("design-options", "design_option", SEED_DESIGN_OPTION_IDS),
            ("complexity-levels", "complexity_level", SEED_COMPLEXITY_LEVEL_IDS),
            ("supplementary-options", "supplementary_option", SEED_OPTION_IDS),
        ] {
            let present = count_seeded(pool, table, ids).await?;
            checks.push((label, present == ids.len() as i64));
        }

        let vitrine: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_type \
             WHERE id = 'site-vitrine' AND base_price = '2500.00' AND estimated_days = 10 AND active = 1)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("site-vitrine-baseline", vitrine == 1));

        let free_design: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM design_option \
             WHERE id = 'simple' AND price_supplement = '0.00' AND active = 1)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("simple-design-is-free", free_design == 1));

        let unit_multiplier: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM complexity_level \
             WHERE id = 'simple' AND multiplier = '1.00' AND active = 1)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("baseline-multiplier-is-one", unit_multiplier == 1));

        let cadences: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT cadence) FROM supplementary_option")
                .fetch_one(pool)
                .await?;
        checks.push(("all-cadences-covered", cadences == 3));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows from a test database. Rows added by
    /// hand are left untouched. Fails if a quote references a seeded
    /// primitive; foreign keys win over cleanup.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for (table, ids) in [
            ("supplementary_option", SEED_OPTION_IDS),
            ("complexity_level", SEED_COMPLEXITY_LEVEL_IDS),
            ("design_option", SEED_DESIGN_OPTION_IDS),
            ("project_type", SEED_PROJECT_TYPE_IDS),
        ] {
            let quoted = sql_array_from_ids(ids);
            sqlx::query(&format!("DELETE FROM {table} WHERE id IN {quoted}"))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn count_seeded(pool: &DbPool, table: &str, ids: &[&str]) -> Result<i64, RepositoryError> {
    let quoted = sql_array_from_ids(ids);
    let count: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
            .fetch_one(pool)
            .await?;
    Ok(count)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedSummary {
    pub project_types: i64,
    pub design_options: i64,
    pub complexity_levels: i64,
    pub options: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
