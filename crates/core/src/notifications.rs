//! Closed set of transactional email events with their fixed
//! subject/template pairs. Adding a variant forces every dispatch
//! site to handle it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Plain-text alternative attached to every HTML email.
pub const TEXT_FALLBACK_BODY: &str = "Veuillez consulter ce message au format HTML.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailEvent {
    Created,
    Reminder,
    Accepted,
    Rejected,
}

impl EmailEvent {
    pub const ALL: [EmailEvent; 4] =
        [EmailEvent::Created, EmailEvent::Reminder, EmailEvent::Accepted, EmailEvent::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailEvent::Created => "created",
            EmailEvent::Reminder => "reminder",
            EmailEvent::Accepted => "accepted",
            EmailEvent::Rejected => "rejected",
        }
    }

    pub fn subject(&self, quote_number: &str, company_name: &str) -> String {
        match self {
            EmailEvent::Created => format!("Votre devis {quote_number} - {company_name}"),
            EmailEvent::Reminder => {
                format!("Rappel - Votre devis {quote_number} expire bientôt")
            }
            EmailEvent::Accepted => format!("Confirmation de signature - Devis {quote_number}"),
            EmailEvent::Rejected => format!("Accusé de réception - Devis {quote_number}"),
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            EmailEvent::Created => "emails/quote_created.html",
            EmailEvent::Reminder => "emails/quote_reminder.html",
            EmailEvent::Accepted => "emails/quote_accepted.html",
            EmailEvent::Rejected => "emails/quote_rejected.html",
        }
    }
}

impl fmt::Display for EmailEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(EmailEvent::Created),
            "reminder" => Ok(EmailEvent::Reminder),
            "accepted" => Ok(EmailEvent::Accepted),
            "rejected" => Ok(EmailEvent::Rejected),
            other => Err(format!(
                "unsupported email event `{other}` (expected created|reminder|accepted|rejected)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_follow_the_fixed_french_wording() {
        assert_eq!(
            EmailEvent::Created.subject("DEVIS-202602-001", "ZsDevWeb"),
            "Votre devis DEVIS-202602-001 - ZsDevWeb"
        );
        assert_eq!(
            EmailEvent::Accepted.subject("DEVIS-202602-001", "ZsDevWeb"),
            "Confirmation de signature - Devis DEVIS-202602-001"
        );
        assert_eq!(
            EmailEvent::Rejected.subject("DEVIS-202602-001", "ZsDevWeb"),
            "Accusé de réception - Devis DEVIS-202602-001"
        );
        assert_eq!(
            EmailEvent::Reminder.subject("DEVIS-202602-001", "ZsDevWeb"),
            "Rappel - Votre devis DEVIS-202602-001 expire bientôt"
        );
    }

    #[test]
    fn events_round_trip_through_their_wire_form() {
        for event in EmailEvent::ALL {
            assert_eq!(event.as_str().parse::<EmailEvent>(), Ok(event));
        }
        assert!("invoice".parse::<EmailEvent>().is_err());
    }

    #[test]
    fn every_event_has_a_dedicated_template() {
        let mut names: Vec<&str> = EmailEvent::ALL.iter().map(|e| e.template_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EmailEvent::ALL.len());
    }
}
