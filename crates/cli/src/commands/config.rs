use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use devisio_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

/// Prints the effective configuration with one provenance annotation per
/// key so operators can see which layer won. Secrets are redacted.
pub fn run(file: Option<&Path>, json_output: bool) -> String {
    let options = LoadOptions {
        config_path: file.map(Path::to_path_buf),
        require_file: file.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = file.map(Path::to_path_buf).or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entries = collect_entries(&config, config_file_doc.as_ref(), config_file_path.as_deref());

    if json_output {
        return serde_json::to_string_pretty(&entries)
            .unwrap_or_else(|error| format!("config serialization failed: {error}"));
    }

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in &entries {
        lines.push(format!("- {} = {} (source: {})", entry.key, entry.value, entry.source));
    }
    lines.join("\n")
}

fn collect_entries(
    config: &AppConfig,
    doc: Option<&Value>,
    file_path: Option<&Path>,
) -> Vec<ConfigEntry> {
    let mut entries = Vec::new();
    let mut push = |key: &'static str, env_keys: &'static [&'static str], value: String| {
        entries.push(ConfigEntry { key, value, source: field_source(key, env_keys, doc, file_path) });
    };

    push("database.url", &["DEVISIO_DATABASE_URL"], config.database.url.clone());
    push(
        "database.max_connections",
        &["DEVISIO_DATABASE_MAX_CONNECTIONS"],
        config.database.max_connections.to_string(),
    );
    push(
        "database.timeout_secs",
        &["DEVISIO_DATABASE_TIMEOUT_SECS"],
        config.database.timeout_secs.to_string(),
    );

    push(
        "server.bind_address",
        &["DEVISIO_SERVER_BIND_ADDRESS"],
        config.server.bind_address.clone(),
    );
    push("server.port", &["DEVISIO_SERVER_PORT"], config.server.port.to_string());
    push(
        "server.health_check_port",
        &["DEVISIO_SERVER_HEALTH_CHECK_PORT"],
        config.server.health_check_port.to_string(),
    );
    push(
        "server.staff_token",
        &["DEVISIO_SERVER_STAFF_TOKEN"],
        redact_secret(config.server.staff_token.expose_secret()),
    );
    push(
        "server.frontend_base_url",
        &["DEVISIO_SERVER_FRONTEND_BASE_URL"],
        config.server.frontend_base_url.clone(),
    );

    push("company.name", &["DEVISIO_COMPANY_NAME"], config.company.name.clone());
    push(
        "company.email",
        &["DEVISIO_COMPANY_EMAIL"],
        config.company.email.as_deref().unwrap_or("<unset>").to_string(),
    );

    push("email.driver", &["DEVISIO_EMAIL_DRIVER"], format!("{:?}", config.email.driver));
    push("email.smtp_host", &["DEVISIO_EMAIL_SMTP_HOST"], config.email.smtp_host.clone());
    push("email.smtp_port", &["DEVISIO_EMAIL_SMTP_PORT"], config.email.smtp_port.to_string());
    push(
        "email.smtp_username",
        &["DEVISIO_EMAIL_SMTP_USERNAME"],
        config.email.smtp_username.as_deref().unwrap_or("<unset>").to_string(),
    );
    push(
        "email.smtp_password",
        &["DEVISIO_EMAIL_SMTP_PASSWORD"],
        if config.email.smtp_password.is_some() { "<redacted>" } else { "<unset>" }.to_string(),
    );
    push("email.from_email", &["DEVISIO_EMAIL_FROM_EMAIL"], config.email.from_email.clone());

    push(
        "documents.storage_dir",
        &["DEVISIO_DOCUMENTS_STORAGE_DIR"],
        config.documents.storage_dir.display().to_string(),
    );
    push(
        "documents.templates_dir",
        &["DEVISIO_DOCUMENTS_TEMPLATES_DIR"],
        config
            .documents
            .templates_dir
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<unset>".to_string()),
    );
    push(
        "documents.wkhtmltopdf_path",
        &["DEVISIO_DOCUMENTS_WKHTMLTOPDF_PATH"],
        config
            .documents
            .wkhtmltopdf_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<unset>".to_string()),
    );

    push(
        "quotes.number_prefix",
        &["DEVISIO_QUOTES_NUMBER_PREFIX"],
        config.quotes.number_prefix.clone(),
    );
    push(
        "quotes.validity_days",
        &["DEVISIO_QUOTES_VALIDITY_DAYS"],
        config.quotes.validity_days.to_string(),
    );
    push(
        "quotes.default_tax_rate",
        &["DEVISIO_QUOTES_DEFAULT_TAX_RATE"],
        config.quotes.default_tax_rate.to_string(),
    );
    push(
        "quotes.reminder_window_days",
        &["DEVISIO_QUOTES_REMINDER_WINDOW_DAYS"],
        config.quotes.reminder_window_days.to_string(),
    );

    push(
        "logging.level",
        &["DEVISIO_LOGGING_LEVEL", "DEVISIO_LOG_LEVEL"],
        config.logging.level.clone(),
    );
    push(
        "logging.format",
        &["DEVISIO_LOGGING_FORMAT", "DEVISIO_LOG_FORMAT"],
        format!("{:?}", config.logging.format),
    );

    entries
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("devisio.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/devisio.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(value: &str) -> String {
    if value.trim().is_empty() {
        return "<empty>".to_string();
    }

    "<redacted>".to_string()
}
