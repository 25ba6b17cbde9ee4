use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies any migrations not yet recorded in `_sqlx_migrations`.
pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Clone, Copy, Debug)]
pub struct MigrationStatus {
    pub applied: i64,
    pub pending: i64,
}

/// Compares the bundled migrations against `_sqlx_migrations`. Errors
/// when the bookkeeping table itself is missing, which means `run_pending`
/// has never run against this database.
pub async fn status(pool: &DbPool) -> Result<MigrationStatus, sqlx::Error> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    let available = MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .count() as i64;
    Ok(MigrationStatus { applied, pending: (available - applied).max(0) })
}
