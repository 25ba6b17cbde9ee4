use std::sync::Arc;

use chrono::Utc;

use crate::commands::CommandResult;
use devisio_core::config::{AppConfig, LoadOptions};
use devisio_db::connect_with_settings;
use devisio_db::repositories::SqlEmailLogRepository;
use devisio_server::notify::Notifier;
use devisio_server::pdf::{init_templates, PdfGenerator};
use devisio_server::quotes::{QuoteService, TracingAuditSink};

/// The reminder sweep as a cron-friendly command: expire overdue
/// quotes, send one reminder per quote expiring inside the window,
/// report counts. Exits non-zero when any delivery failed so schedulers
/// notice.
pub fn run(window_days: Option<u32>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "remind",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    let window = window_days.unwrap_or(config.quotes.reminder_window_days);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "remind",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let templates = init_templates(&config.documents);
        let documents = PdfGenerator::new(templates.clone(), &config.documents);
        let transport = Notifier::transport_from_config(&config.email)
            .map_err(|error| ("email_transport", error.to_string(), 6u8))?;
        let notifier = Notifier::new(
            templates,
            transport,
            SqlEmailLogRepository::new(pool.clone()),
            &config,
        );
        let service =
            QuoteService::new(pool.clone(), &config, documents, notifier, Arc::new(TracingAuditSink));

        let sweep = service
            .remind_expiring(window, Utc::now())
            .await
            .map_err(|error| ("sweep", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(sweep)
    });

    match result {
        Ok(sweep) => {
            let message = format!(
                "reminder sweep over {window} day window: {} expired, {} due, {} sent, {} failed",
                sweep.expired, sweep.due, sweep.sent, sweep.failed,
            );
            if sweep.failed > 0 {
                CommandResult::failure("remind", "delivery_incomplete", message, 6)
            } else {
                CommandResult::success("remind", message)
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("remind", error_class, message, exit_code)
        }
    }
}
