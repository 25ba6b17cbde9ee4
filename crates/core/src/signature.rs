//! Electronic signature capture for the public signing flow: data-URL
//! payload validation, image decoding, and request-context helpers.

use base64::Engine;
use uuid::Uuid;

use crate::errors::DomainError;

/// A validated, decoded signature image ready for storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignaturePayload {
    pub mime: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl SignaturePayload {
    /// Parses a `<mime>;base64,<data>` payload, with or without a
    /// leading `data:` scheme. Malformed input is a validation error,
    /// never a crash.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidSignaturePayload(
                "signature image is required".to_owned(),
            ));
        }
        let without_scheme = trimmed.strip_prefix("data:").unwrap_or(trimmed);
        let (mime, encoded) = without_scheme.split_once(";base64,").ok_or_else(|| {
            DomainError::InvalidSignaturePayload(
                "expected a `<mime>;base64,<data>` data URL".to_owned(),
            )
        })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| {
                DomainError::InvalidSignaturePayload("image data is not valid base64".to_owned())
            })?;
        if bytes.is_empty() {
            return Err(DomainError::InvalidSignaturePayload(
                "decoded signature image is empty".to_owned(),
            ));
        }
        Ok(Self { mime: mime.to_owned(), extension: extension_for(mime), bytes })
    }

    /// Collision-resistant storage name built from the quote's label
    /// and a random suffix.
    pub fn storage_filename(&self, quote_label: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("signature_{quote_label}_{}.{}", &suffix[..8], self.extension)
    }
}

/// The mime hint selects the stored file extension; anything outside
/// the allowed set falls back to png.
fn extension_for(mime: &str) -> &'static str {
    let hint = mime.rsplit('/').next().unwrap_or_default().to_ascii_lowercase();
    match hint.as_str() {
        "jpg" => "jpg",
        "jpeg" => "jpeg",
        "webp" => "webp",
        _ => "png",
    }
}

/// First entry of a forwarded-for header when present, the direct peer
/// address otherwise.
pub fn resolve_client_ip(forwarded_for: Option<&str>, peer_addr: &str) -> String {
    if let Some(header) = forwarded_for {
        if let Some(first) = header.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    peer_addr.to_owned()
}
