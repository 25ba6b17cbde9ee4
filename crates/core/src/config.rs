use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub company: CompanyConfig,
    pub email: EmailConfig,
    pub documents: DocumentsConfig,
    pub quotes: QuotesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
    pub staff_token: SecretString,
    pub frontend_base_url: String,
}

#[derive(Clone, Debug)]
pub struct CompanyConfig {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub siret: Option<String>,
    pub tva_number: Option<String>,
    pub footer_text: Option<String>,
    pub email_signature: Option<String>,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub driver: EmailDriver,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_tls: SmtpTls,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub from_email: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DocumentsConfig {
    pub storage_dir: PathBuf,
    pub templates_dir: Option<PathBuf>,
    pub wkhtmltopdf_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct QuotesConfig {
    pub number_prefix: String,
    pub validity_days: u32,
    pub default_tax_rate: Decimal,
    pub reminder_window_days: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailDriver {
    Smtp,
    Log,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    Starttls,
    Implicit,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub server_port: Option<u16>,
    pub storage_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://devisio.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                health_check_port: 8081,
                graceful_shutdown_secs: 15,
                staff_token: String::new().into(),
                frontend_base_url: "http://localhost:5173".to_string(),
            },
            company: CompanyConfig {
                name: "Devisio".to_string(),
                email: None,
                phone: None,
                address: None,
                siret: None,
                tva_number: None,
                footer_text: None,
                email_signature: None,
            },
            email: EmailConfig {
                driver: EmailDriver::Log,
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                smtp_tls: SmtpTls::Starttls,
                smtp_username: None,
                smtp_password: None,
                from_email: "devis@localhost".to_string(),
                timeout_secs: 30,
            },
            documents: DocumentsConfig {
                storage_dir: PathBuf::from("storage"),
                templates_dir: None,
                wkhtmltopdf_path: None,
            },
            quotes: QuotesConfig {
                number_prefix: "DEVIS".to_string(),
                validity_days: 30,
                default_tax_rate: Decimal::new(2_000, 2),
                reminder_window_days: 3,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for EmailDriver {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "log" => Ok(Self::Log),
            other => Err(ConfigError::Validation(format!(
                "unsupported email driver `{other}` (expected smtp|log)"
            ))),
        }
    }
}

impl std::str::FromStr for SmtpTls {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::Starttls),
            "implicit" => Ok(Self::Implicit),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Validation(format!(
                "unsupported smtp tls mode `{other}` (expected starttls|implicit|none)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("devisio.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(staff_token_value) = server.staff_token {
                self.server.staff_token = secret_value(staff_token_value);
            }
            if let Some(frontend_base_url) = server.frontend_base_url {
                self.server.frontend_base_url = frontend_base_url;
            }
        }

        if let Some(company) = patch.company {
            if let Some(name) = company.name {
                self.company.name = name;
            }
            if let Some(email) = company.email {
                self.company.email = Some(email);
            }
            if let Some(phone) = company.phone {
                self.company.phone = Some(phone);
            }
            if let Some(address) = company.address {
                self.company.address = Some(address);
            }
            if let Some(siret) = company.siret {
                self.company.siret = Some(siret);
            }
            if let Some(tva_number) = company.tva_number {
                self.company.tva_number = Some(tva_number);
            }
            if let Some(footer_text) = company.footer_text {
                self.company.footer_text = Some(footer_text);
            }
            if let Some(email_signature) = company.email_signature {
                self.company.email_signature = Some(email_signature);
            }
        }

        if let Some(email) = patch.email {
            if let Some(driver) = email.driver {
                self.email.driver = driver;
            }
            if let Some(smtp_host) = email.smtp_host {
                self.email.smtp_host = smtp_host;
            }
            if let Some(smtp_port) = email.smtp_port {
                self.email.smtp_port = smtp_port;
            }
            if let Some(smtp_tls) = email.smtp_tls {
                self.email.smtp_tls = smtp_tls;
            }
            if let Some(smtp_username) = email.smtp_username {
                self.email.smtp_username = Some(smtp_username);
            }
            if let Some(smtp_password_value) = email.smtp_password {
                self.email.smtp_password = Some(secret_value(smtp_password_value));
            }
            if let Some(from_email) = email.from_email {
                self.email.from_email = from_email;
            }
            if let Some(timeout_secs) = email.timeout_secs {
                self.email.timeout_secs = timeout_secs;
            }
        }

        if let Some(documents) = patch.documents {
            if let Some(storage_dir) = documents.storage_dir {
                self.documents.storage_dir = storage_dir;
            }
            if let Some(templates_dir) = documents.templates_dir {
                self.documents.templates_dir = Some(templates_dir);
            }
            if let Some(wkhtmltopdf_path) = documents.wkhtmltopdf_path {
                self.documents.wkhtmltopdf_path = Some(wkhtmltopdf_path);
            }
        }

        if let Some(quotes) = patch.quotes {
            if let Some(number_prefix) = quotes.number_prefix {
                self.quotes.number_prefix = number_prefix;
            }
            if let Some(validity_days) = quotes.validity_days {
                self.quotes.validity_days = validity_days;
            }
            if let Some(default_tax_rate) = quotes.default_tax_rate {
                self.quotes.default_tax_rate = default_tax_rate;
            }
            if let Some(reminder_window_days) = quotes.reminder_window_days {
                self.quotes.reminder_window_days = reminder_window_days;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DEVISIO_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DEVISIO_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DEVISIO_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DEVISIO_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DEVISIO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DEVISIO_SERVER_PORT") {
            self.server.port = parse_u16("DEVISIO_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("DEVISIO_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DEVISIO_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_SERVER_STAFF_TOKEN") {
            self.server.staff_token = secret_value(value);
        }
        if let Some(value) = read_env("DEVISIO_SERVER_FRONTEND_BASE_URL") {
            self.server.frontend_base_url = value;
        }

        if let Some(value) = read_env("DEVISIO_COMPANY_NAME") {
            self.company.name = value;
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_EMAIL") {
            self.company.email = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_PHONE") {
            self.company.phone = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_ADDRESS") {
            self.company.address = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_SIRET") {
            self.company.siret = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_TVA_NUMBER") {
            self.company.tva_number = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_FOOTER_TEXT") {
            self.company.footer_text = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_COMPANY_EMAIL_SIGNATURE") {
            self.company.email_signature = Some(value);
        }

        if let Some(value) = read_env("DEVISIO_EMAIL_DRIVER") {
            self.email.driver = value.parse()?;
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_SMTP_HOST") {
            self.email.smtp_host = value;
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_SMTP_PORT") {
            self.email.smtp_port = parse_u16("DEVISIO_EMAIL_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_SMTP_TLS") {
            self.email.smtp_tls = value.parse()?;
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = Some(value);
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = Some(secret_value(value));
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_FROM_EMAIL") {
            self.email.from_email = value;
        }
        if let Some(value) = read_env("DEVISIO_EMAIL_TIMEOUT_SECS") {
            self.email.timeout_secs = parse_u64("DEVISIO_EMAIL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DEVISIO_DOCUMENTS_STORAGE_DIR") {
            self.documents.storage_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("DEVISIO_DOCUMENTS_TEMPLATES_DIR") {
            self.documents.templates_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("DEVISIO_DOCUMENTS_WKHTMLTOPDF_PATH") {
            self.documents.wkhtmltopdf_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("DEVISIO_QUOTES_NUMBER_PREFIX") {
            self.quotes.number_prefix = value;
        }
        if let Some(value) = read_env("DEVISIO_QUOTES_VALIDITY_DAYS") {
            self.quotes.validity_days = parse_u32("DEVISIO_QUOTES_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_QUOTES_DEFAULT_TAX_RATE") {
            self.quotes.default_tax_rate =
                parse_decimal("DEVISIO_QUOTES_DEFAULT_TAX_RATE", &value)?;
        }
        if let Some(value) = read_env("DEVISIO_QUOTES_REMINDER_WINDOW_DAYS") {
            self.quotes.reminder_window_days =
                parse_u32("DEVISIO_QUOTES_REMINDER_WINDOW_DAYS", &value)?;
        }

        let log_level = read_env("DEVISIO_LOGGING_LEVEL").or_else(|| read_env("DEVISIO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DEVISIO_LOGGING_FORMAT").or_else(|| read_env("DEVISIO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(storage_dir) = overrides.storage_dir {
            self.documents.storage_dir = storage_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_company(&self.company)?;
        validate_email(&self.email)?;
        validate_documents(&self.documents)?;
        validate_quotes(&self.quotes)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("devisio.toml"), PathBuf::from("config/devisio.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    let staff_token = server.staff_token.expose_secret();
    if staff_token.is_empty() {
        return Err(ConfigError::Validation(
            "server.staff_token is required. Set it in devisio.toml or via DEVISIO_SERVER_STAFF_TOKEN".to_string()
        ));
    }
    if staff_token.len() < 16 {
        return Err(ConfigError::Validation(
            "server.staff_token must be at least 16 characters".to_string(),
        ));
    }

    let frontend = server.frontend_base_url.trim();
    if !frontend.starts_with("http://") && !frontend.starts_with("https://") {
        return Err(ConfigError::Validation(
            "server.frontend_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_company(company: &CompanyConfig) -> Result<(), ConfigError> {
    if company.name.trim().is_empty() {
        return Err(ConfigError::Validation("company.name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if email.timeout_secs == 0 || email.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "email.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !email.from_email.contains('@') {
        return Err(ConfigError::Validation(
            "email.from_email must be an address containing `@`".to_string(),
        ));
    }

    if email.driver == EmailDriver::Smtp {
        if email.smtp_host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "email.smtp_host must not be empty when email.driver is smtp".to_string(),
            ));
        }
        if email.smtp_port == 0 {
            return Err(ConfigError::Validation(
                "email.smtp_port must be greater than zero when email.driver is smtp".to_string(),
            ));
        }
    }

    if email.smtp_username.is_some() != email.smtp_password.is_some() {
        return Err(ConfigError::Validation(
            "email.smtp_username and email.smtp_password must be provided together".to_string(),
        ));
    }

    Ok(())
}

fn validate_documents(documents: &DocumentsConfig) -> Result<(), ConfigError> {
    if documents.storage_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("documents.storage_dir must not be empty".to_string()));
    }

    Ok(())
}

fn validate_quotes(quotes: &QuotesConfig) -> Result<(), ConfigError> {
    let prefix = quotes.number_prefix.trim();
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "quotes.number_prefix must be non-empty without whitespace".to_string(),
        ));
    }

    if quotes.validity_days == 0 || quotes.validity_days > 365 {
        return Err(ConfigError::Validation(
            "quotes.validity_days must be in range 1..=365".to_string(),
        ));
    }

    if quotes.default_tax_rate < Decimal::ZERO || quotes.default_tax_rate > Decimal::ONE_HUNDRED {
        return Err(ConfigError::Validation(
            "quotes.default_tax_rate must be in range 0..=100".to_string(),
        ));
    }

    if quotes.reminder_window_days == 0 || quotes.reminder_window_days > 60 {
        return Err(ConfigError::Validation(
            "quotes.reminder_window_days must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    company: Option<CompanyPatch>,
    email: Option<EmailPatch>,
    documents: Option<DocumentsPatch>,
    quotes: Option<QuotesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    staff_token: Option<String>,
    frontend_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompanyPatch {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    siret: Option<String>,
    tva_number: Option<String>,
    footer_text: Option<String>,
    email_signature: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    driver: Option<EmailDriver>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_tls: Option<SmtpTls>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from_email: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsPatch {
    storage_dir: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    wkhtmltopdf_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotesPatch {
    number_prefix: Option<String>,
    validity_days: Option<u32>,
    default_tax_rate: Option<Decimal>,
    reminder_window_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
