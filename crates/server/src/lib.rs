//! Devisio server: quote creation, pricing, the public signing flow,
//! documents, notifications, and the staff API.

pub mod bootstrap;
pub mod health;
pub mod notify;
pub mod pdf;
pub mod quotes;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use devisio_core::config::{AppConfig, LoadOptions};
use devisio_db::repositories::SqlEmailLogRepository;

use crate::notify::Notifier;
use crate::pdf::PdfGenerator;
use crate::quotes::{QuoteService, TracingAuditSink};
use crate::routes::ApiState;

pub fn init_logging(config: &AppConfig) {
    use devisio_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let templates = pdf::init_templates(&app.config.documents);
    let documents = PdfGenerator::new(templates.clone(), &app.config.documents);
    let transport = Notifier::transport_from_config(&app.config.email)?;
    let notifier = Notifier::new(
        templates,
        transport,
        SqlEmailLogRepository::new(app.db_pool.clone()),
        &app.config,
    );
    let service = QuoteService::new(
        app.db_pool.clone(),
        &app.config,
        documents,
        notifier,
        Arc::new(TracingAuditSink),
    );
    let state = ApiState {
        service: Arc::new(service),
        staff_token: app.config.server.staff_token.clone(),
    };

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        address = %address,
        "devisio-server listening"
    );

    axum::serve(
        listener,
        routes::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!(event_name = "system.server.stopped", "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
