//! Boundary cleanup for client-submitted free text: HTML stripping,
//! whitespace trimming, length caps, and email shape validation.

use crate::domain::quote::ClientDetails;
use crate::errors::DomainError;

pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_PHONE_CHARS: usize = 20;
pub const MAX_COMPANY_CHARS: usize = 200;
pub const MAX_ADDRESS_CHARS: usize = 500;
pub const MAX_NOTE_CHARS: usize = 1000;

/// Removes `<...>` spans. Tag contents are dropped wholesale; an
/// unclosed `<` swallows the rest of the input.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

pub fn clean_text(input: &str, max_chars: usize) -> String {
    let stripped = strip_tags(input);
    stripped.trim().chars().take(max_chars).collect()
}

/// `None` when the cleaned value comes out empty.
pub fn clean_optional(input: Option<&str>, max_chars: usize) -> Option<String> {
    let cleaned = clean_text(input?, max_chars);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Shape-checks an address and normalizes it to lowercase. Storage and
/// log-deduplication both key off the normalized form.
pub fn validate_email(input: &str) -> Result<String, DomainError> {
    let email = input.trim();
    let invalid = || DomainError::InvalidEmailAddress(email.to_owned());
    if email.is_empty() || email.len() > MAX_EMAIL_CHARS || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(email.to_lowercase())
}

/// Builds sanitized client details from raw request fields. The name
/// and a well-formed email are required; everything else collapses to
/// `None` when empty.
pub fn clean_client_details(
    name: &str,
    email: &str,
    phone: Option<&str>,
    company: Option<&str>,
    address: Option<&str>,
) -> Result<ClientDetails, DomainError> {
    let name = clean_text(name, MAX_NAME_CHARS);
    if name.is_empty() {
        return Err(DomainError::MissingRequiredField("client_name"));
    }
    let email = validate_email(email)?;
    Ok(ClientDetails {
        name,
        email,
        phone: clean_optional(phone, MAX_PHONE_CHARS),
        company: clean_optional(company, MAX_COMPANY_CHARS),
        address: clean_optional(address, MAX_ADDRESS_CHARS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_removed_wholesale() {
        assert_eq!(strip_tags("<b>Jean</b> Dupont"), "Jean Dupont");
        assert_eq!(strip_tags("<script>alert('x')</script>ok"), "alert('x')ok");
        assert_eq!(strip_tags("no markup"), "no markup");
    }

    #[test]
    fn clean_text_trims_and_caps_by_characters() {
        assert_eq!(clean_text("  Jean Dupont  ", 200), "Jean Dupont");
        assert_eq!(clean_text("ééééé", 3), "ééé");
    }

    #[test]
    fn empty_optionals_collapse_to_none() {
        assert_eq!(clean_optional(Some("  <p></p>  "), 200), None);
        assert_eq!(clean_optional(Some("ACME"), 200), Some("ACME".to_owned()));
        assert_eq!(clean_optional(None, 200), None);
    }

    #[test]
    fn email_shape_is_enforced() {
        assert_eq!(validate_email(" Claire@Example.FR ").unwrap(), "claire@example.fr");

        for bad in ["", "not-an-email", "a@b", "a b@c.fr", "@example.fr", "a@", "a@.fr", "a@@b.fr"]
        {
            assert!(validate_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn client_details_require_name_and_valid_email() {
        let details = clean_client_details(
            " <b>Claire</b> Dupont ",
            "claire@example.fr",
            Some("  "),
            Some("ACME"),
            None,
        )
        .unwrap();
        assert_eq!(details.name, "Claire Dupont");
        assert_eq!(details.phone, None);
        assert_eq!(details.company.as_deref(), Some("ACME"));

        let missing = clean_client_details("<i></i>", "claire@example.fr", None, None, None);
        assert_eq!(missing.unwrap_err(), DomainError::MissingRequiredField("client_name"));

        let bad_email = clean_client_details("Claire", "nope", None, None, None);
        assert!(matches!(bad_email.unwrap_err(), DomainError::InvalidEmailAddress(_)));
    }
}
