//! Pricing catalog primitives.
//!
//! Each primitive is an independently priced, independently toggle-able
//! building block. Quotes reference them by id at creation time and keep
//! their own monetary snapshot afterwards, so deactivating a primitive
//! never rewrites an existing quote.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectTypeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignOptionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexityLevelId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionId(pub String);

/// Kind of web project being quoted, carrying the base price and the
/// baseline delivery estimate in working days.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectType {
    pub id: ProjectTypeId,
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    pub estimated_days: u32,
    pub active: bool,
}

/// Design tier applied on top of the project base price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignOption {
    pub id: DesignOptionId,
    pub name: String,
    pub price_supplement: Decimal,
    pub active: bool,
}

/// Multiplier applied to the project + design subtotal and to the
/// estimated duration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityLevel {
    pub id: ComplexityLevelId,
    pub name: String,
    pub multiplier: Decimal,
    pub active: bool,
}

/// How often a supplementary option is billed. Only one-time options
/// enter the quote subtotal; recurring ones are displayed separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCadence {
    OneTime,
    Monthly,
    Yearly,
}

impl BillingCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCadence::OneTime => "one_time",
            BillingCadence::Monthly => "monthly",
            BillingCadence::Yearly => "yearly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, BillingCadence::OneTime)
    }
}

impl fmt::Display for BillingCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCadence {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "one_time" => Ok(BillingCadence::OneTime),
            "monthly" => Ok(BillingCadence::Monthly),
            "yearly" => Ok(BillingCadence::Yearly),
            other => {
                Err(format!("unsupported billing cadence `{other}` (expected one_time|monthly|yearly)"))
            }
        }
    }
}

/// À-la-carte add-on (hosting, maintenance, SEO pack, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementaryOption {
    pub id: OptionId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub cadence: BillingCadence,
    pub active: bool,
}

/// Everything a client-facing configurator needs to build a quote request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub project_types: Vec<ProjectType>,
    pub design_options: Vec<DesignOption>,
    pub complexity_levels: Vec<ComplexityLevel>,
    pub options: Vec<SupplementaryOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_cadence_round_trips_through_strings() {
        for cadence in [BillingCadence::OneTime, BillingCadence::Monthly, BillingCadence::Yearly] {
            let parsed: BillingCadence =
                cadence.as_str().parse().expect("known cadence should parse");
            assert_eq!(parsed, cadence);
        }
    }

    #[test]
    fn billing_cadence_rejects_unknown_value() {
        let error = "weekly".parse::<BillingCadence>().unwrap_err();
        assert_eq!(
            error,
            "unsupported billing cadence `weekly` (expected one_time|monthly|yearly)"
        );
    }

    #[test]
    fn only_one_time_cadence_is_non_recurring() {
        assert!(!BillingCadence::OneTime.is_recurring());
        assert!(BillingCadence::Monthly.is_recurring());
        assert!(BillingCadence::Yearly.is_recurring());
    }
}
