//! Startup sequence: load configuration, open the database pool, apply
//! pending migrations. Everything here fails fast; a server that
//! cannot reach its database should not come up half-alive.

use devisio_core::config::{AppConfig, ConfigError, LoadOptions};
use devisio_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Bootstrap from an already-loaded (and validated) configuration.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    Ok(Application { config, db_pool })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use devisio_core::config::{ConfigOverrides, LoadOptions};
    use secrecy::ExposeSecret;

    use crate::bootstrap::bootstrap;

    // Bootstrap reads process-wide environment variables; hold this
    // lock while mutating them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const STAFF_TOKEN_VAR: &str = "DEVISIO_SERVER_STAFF_TOKEN";

    fn options_with_database(url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_staff_token() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::env::remove_var(STAFF_TOKEN_VAR);

        let result = bootstrap(options_with_database("sqlite::memory:")).await;

        let message = result.err().expect("bootstrap must refuse to start").to_string();
        assert!(message.contains("server.staff_token"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_connects_migrates_and_exposes_the_pool() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::env::set_var(STAFF_TOKEN_VAR, "staff-token-0123456789");

        let app = bootstrap(options_with_database("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed");
        std::env::remove_var(STAFF_TOKEN_VAR);

        assert_eq!(
            app.config.server.staff_token.expose_secret(),
            "staff-token-0123456789"
        );

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('quote', 'quote_option', 'quote_email_log', 'project_type')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema lookup should succeed");
        assert_eq!(table_count, 4, "bootstrap should apply the quote schema");

        app.db_pool.close().await;
    }
}
