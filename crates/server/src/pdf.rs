//! Quote document rendering and PDF conversion.
//!
//! Documents are rendered from the `documents/quote_document.html` tera
//! template and converted to PDF through an external `wkhtmltopdf`
//! binary when one is available. Without a converter the rendered HTML
//! is kept as-is; it is stored and served exactly like a PDF would be.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use chrono::{DateTime, NaiveDate};
use devisio_core::config::{CompanyConfig, DocumentsConfig};
use devisio_core::pricing::round_money;
use devisio_core::Quote;
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

const QUOTE_DOCUMENT_TEMPLATE: &str = "documents/quote_document.html";
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);

const EMBEDDED_TEMPLATES: [(&str, &str); 5] = [
    (
        "documents/quote_document.html",
        include_str!("../../../templates/documents/quote_document.html"),
    ),
    ("emails/quote_created.html", include_str!("../../../templates/emails/quote_created.html")),
    ("emails/quote_accepted.html", include_str!("../../../templates/emails/quote_accepted.html")),
    ("emails/quote_rejected.html", include_str!("../../../templates/emails/quote_rejected.html")),
    ("emails/quote_reminder.html", include_str!("../../../templates/emails/quote_reminder.html")),
];

/// Initialize the shared tera engine for documents and emails.
///
/// Templates are loaded from the configured directory when possible;
/// any template missing from the filesystem falls back to the copy
/// embedded at build time, so a bare deployment still renders.
pub fn init_templates(documents: &DocumentsConfig) -> Arc<Tera> {
    let templates_dir =
        documents.templates_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR));

    let mut tera = match Tera::new(&format!("{}/**/*", templates_dir.display())) {
        Ok(tera) => tera,
        Err(e) => {
            warn!(error = %e, "failed to load templates from filesystem, using embedded templates");
            Tera::default()
        }
    };

    register_template_filters(&mut tera);

    for (name, source) in EMBEDDED_TEMPLATES {
        if tera.get_template_names().all(|loaded| loaded != name) {
            tera.add_raw_template(name, source).ok();
        }
    }

    Arc::new(tera)
}

/// Tera engine holding only the embedded templates. Used as the last
/// fallback and by tests that must not touch the filesystem.
pub fn embedded_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    register_template_filters(&mut tera);
    for (name, source) in EMBEDDED_TEMPLATES {
        tera.add_raw_template(name, source).ok();
    }
    Arc::new(tera)
}

/// Register custom Tera filters used by quote templates.
///
/// - `money`:   French money format, e.g. `quote.pricing.total | money`
/// - `date_fr`: `DD/MM/YYYY`, e.g. `quote.created_at | date_fr`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("date_fr", tera_date_fr_filter);
}

/// Formats an amount the way French business documents expect it:
/// comma decimal separator, narrow no-break space as the thousands
/// separator, and a trailing euro sign.
pub fn format_euros(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = rounded.abs().to_string();

    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part.to_string(), format!("{frac_part:0<2}")),
        None => (text, "00".to_string()),
    };

    let mut grouped = String::new();
    for (index, digit) in int_part.chars().rev().enumerate() {
        if index > 0 && index % 3 == 0 {
            grouped.push('\u{202f}');
        }
        grouped.push(digit);
    }
    let grouped: String = grouped.chars().rev().collect();

    format!("{}{grouped},{frac_part}\u{202f}€", if negative { "-" } else { "" })
}

/// Money filter over serialized `Decimal` values. `rust_decimal`
/// serializes as a JSON string, so strings are the primary input;
/// plain numbers are accepted for literals in templates.
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw)
            .map_err(|_| tera::Error::msg(format!("money filter cannot parse `{raw}`")))?,
        tera::Value::Number(n) => {
            Decimal::try_from(n.as_f64().unwrap_or(0.0)).unwrap_or(Decimal::ZERO)
        }
        tera::Value::Null => Decimal::ZERO,
        _ => return Err(tera::Error::msg("money filter expects a string or number")),
    };
    Ok(tera::Value::String(format_euros(amount)))
}

/// `DD/MM/YYYY` from an RFC 3339 datetime or a plain `YYYY-MM-DD` date.
fn tera_date_fr_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("date_fr filter expects a string input"))?;

    let formatted = if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        datetime.format("%d/%m/%Y").to_string()
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        date.format("%d/%m/%Y").to_string()
    } else {
        return Err(tera::Error::msg(format!("date_fr filter cannot parse `{raw}`")));
    };

    Ok(tera::Value::String(formatted))
}

/// Document generation error types
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("conversion timed out after {0}s")]
    Timeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Catalog figures resolved at render time for the line-item table.
/// The quote itself only stores catalog ids plus option snapshots.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentLines {
    pub project_type: String,
    pub base_price: Decimal,
    pub design: String,
    pub design_supplement: Decimal,
    pub complexity: String,
    pub complexity_multiplier: Decimal,
    pub core_subtotal: Decimal,
    pub estimated_days: u32,
}

/// Renders quote documents and stores them under the documents dir.
#[derive(Clone, Debug)]
pub struct PdfGenerator {
    templates: Arc<Tera>,
    wkhtmltopdf_path: Option<String>,
    storage_dir: PathBuf,
}

impl PdfGenerator {
    pub fn new(templates: Arc<Tera>, documents: &DocumentsConfig) -> Self {
        let wkhtmltopdf_path = match &documents.wkhtmltopdf_path {
            Some(path) => Some(path.display().to_string()),
            None => which::which("wkhtmltopdf").ok().map(|path| path.to_string_lossy().to_string()),
        };

        match &wkhtmltopdf_path {
            Some(path) => info!(path = %path, "wkhtmltopdf found"),
            None => warn!("wkhtmltopdf not found, quote documents will be stored as HTML"),
        }

        Self { templates, wkhtmltopdf_path, storage_dir: documents.storage_dir.clone() }
    }

    /// Render the quote document HTML from the tera template.
    pub fn render_html(
        &self,
        quote: &Quote,
        company: &CompanyConfig,
        lines: &DocumentLines,
    ) -> Result<String, PdfError> {
        let mut context = Context::new();
        context.insert("quote", quote);
        context.insert("client", &quote.client);
        context.insert("options", &quote.options);
        context.insert("lines", lines);
        context.insert("company", &company_context(company));

        // wkhtmltopdf only resolves local images from absolute paths.
        let signature_image = quote
            .signature_path
            .as_deref()
            .and_then(|path| std::fs::canonicalize(path).ok())
            .map(|path| format!("file://{}", path.display()));
        context.insert("signature_image", &signature_image);

        self.templates
            .render(QUOTE_DOCUMENT_TEMPLATE, &context)
            .map_err(|e| PdfError::Template(e.to_string()))
    }

    /// Generate the document for a quote.
    ///
    /// Returns PDF bytes when a converter is available and succeeds,
    /// otherwise the rendered HTML.
    pub async fn generate(
        &self,
        quote: &Quote,
        company: &CompanyConfig,
        lines: &DocumentLines,
    ) -> Result<PdfResult, PdfError> {
        let html = self.render_html(quote, company, lines)?;

        if let Some(ref wkhtmltopdf) = self.wkhtmltopdf_path {
            match self.convert_html_to_pdf(&html, wkhtmltopdf).await {
                Ok(pdf_bytes) => Ok(PdfResult::Pdf(pdf_bytes)),
                Err(e) => {
                    warn!(error = %e, quote_number = %quote.number, "PDF conversion failed, falling back to HTML");
                    Ok(PdfResult::Html(html))
                }
            }
        } else {
            Ok(PdfResult::Html(html))
        }
    }

    /// Write a generated document into the storage dir as
    /// `{number}.pdf` or `{number}.html`. Overwrites any previous
    /// render for the same quote.
    pub async fn persist(&self, number: &str, document: &PdfResult) -> Result<PathBuf, PdfError> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;

        let (filename, bytes): (String, &[u8]) = match document {
            PdfResult::Pdf(pdf_bytes) => (format!("{number}.pdf"), pdf_bytes.as_slice()),
            PdfResult::Html(html) => (format!("{number}.html"), html.as_bytes()),
        };

        let path = self.storage_dir.join(filename);
        tokio::fs::write(&path, bytes).await?;

        info!(path = %path.display(), size = bytes.len(), "quote document stored");
        Ok(path)
    }

    /// Read a previously stored document back from disk.
    pub async fn load_stored(&self, path: &str) -> Result<PdfResult, PdfError> {
        let bytes = tokio::fs::read(path).await?;
        if path.ends_with(".pdf") {
            Ok(PdfResult::Pdf(bytes))
        } else {
            Ok(PdfResult::Html(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    /// Write signature image bytes next to the quote documents.
    pub async fn store_signature(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PdfError> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let path = self.storage_dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Convert HTML to PDF using wkhtmltopdf
    async fn convert_html_to_pdf(
        &self,
        html: &str,
        wkhtmltopdf_path: &str,
    ) -> Result<Vec<u8>, PdfError> {
        // Write HTML to temp file
        let temp_dir = std::env::temp_dir();
        let html_path = temp_dir.join(format!("devis_{}.html", uuid::Uuid::new_v4().simple()));
        let pdf_path = temp_dir.join(format!("devis_{}.pdf", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&html_path, html).await?;

        let mut command = Command::new(wkhtmltopdf_path);
        command
            .arg("--page-size")
            .arg("A4")
            .arg("--margin-top")
            .arg("10mm")
            .arg("--margin-bottom")
            .arg("10mm")
            .arg("--margin-left")
            .arg("10mm")
            .arg("--margin-right")
            .arg("10mm")
            .arg("--encoding")
            .arg("utf-8")
            .arg("--enable-local-file-access")
            .arg(&html_path)
            .arg(&pdf_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(CONVERSION_TIMEOUT, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = tokio::fs::remove_file(&html_path).await;
                return Err(PdfError::Timeout(CONVERSION_TIMEOUT.as_secs()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(stderr = %stderr, "wkhtmltopdf failed");
            let _ = tokio::fs::remove_file(&html_path).await;
            return Err(PdfError::Conversion(stderr.to_string()));
        }

        let pdf_bytes = tokio::fs::read(&pdf_path).await?;

        // Cleanup temp files
        let _ = tokio::fs::remove_file(&html_path).await;
        let _ = tokio::fs::remove_file(&pdf_path).await;

        info!(size = pdf_bytes.len(), "PDF generated successfully");

        Ok(pdf_bytes)
    }
}

fn company_context(company: &CompanyConfig) -> serde_json::Value {
    serde_json::json!({
        "name": company.name,
        "email": company.email,
        "phone": company.phone,
        "address": company.address,
        "siret": company.siret,
        "tva_number": company.tva_number,
        "footer_text": company.footer_text,
    })
}

/// Result of document generation
pub enum PdfResult {
    Pdf(Vec<u8>),
    Html(String),
}

impl PdfResult {
    pub fn is_pdf(&self) -> bool {
        matches!(self, PdfResult::Pdf(_))
    }

    /// Convert to an Axum response
    pub fn into_response(self, filename: &str) -> Response {
        match self {
            PdfResult::Pdf(bytes) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/pdf")
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                )
                .body(Body::from(bytes))
                .unwrap(),
            PdfResult::Html(html) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
                .body(Body::from(html))
                .unwrap(),
        }
    }
}
