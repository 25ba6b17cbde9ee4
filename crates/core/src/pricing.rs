//! Monetary calculator for quotes. Pure with respect to its inputs:
//! the same configuration, discount, and tax rate always produce the
//! same breakdown, and nothing else ever writes the derived fields.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::catalog::BillingCadence;
use crate::domain::quote::QuoteConfiguration;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percent,
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percent => "percent",
            DiscountKind::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "percent" => Ok(DiscountKind::Percent),
            "fixed" => Ok(DiscountKind::Fixed),
            other => {
                Err(format!("unsupported discount kind `{other}` (expected percent|fixed)"))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub kind: DiscountKind,
    pub value: Decimal,
    pub reason: Option<String>,
}

/// 30/40/30 split of the tax-inclusive total. Each amount is rounded
/// independently, so the three parts may drift from the total by a
/// cent or two; callers needing bit-exact sums must reconcile
/// themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub deposit: Decimal,
    pub midpoint: Decimal,
    pub balance: Decimal,
}

impl InstallmentPlan {
    pub fn sum(&self) -> Decimal {
        self.deposit + self.midpoint + self.balance
    }
}

/// The complete set of derived monetary fields for one quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub net_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub installments: InstallmentPlan,
    pub monthly_total: Decimal,
    pub yearly_total: Decimal,
    pub duration_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricingStep {
    pub stage: &'static str,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PricingTrace {
    pub steps: Vec<PricingStep>,
}

impl PricingTrace {
    fn push(&mut self, stage: &'static str, detail: impl Into<String>, amount: Decimal) {
        self.steps.push(PricingStep { stage, detail: detail.into(), amount });
    }
}

/// Rounds to currency precision, midpoints away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn price(
    configuration: &QuoteConfiguration,
    discount: Option<&Discount>,
    tax_rate: Decimal,
) -> Result<PriceBreakdown, DomainError> {
    price_with_trace(configuration, discount, tax_rate).map(|(breakdown, _)| breakdown)
}

/// Runs the full calculation and records one step per contributing
/// term. Step order mirrors the calculation order.
pub fn price_with_trace(
    configuration: &QuoteConfiguration,
    discount: Option<&Discount>,
    tax_rate: Decimal,
) -> Result<(PriceBreakdown, PricingTrace), DomainError> {
    ensure_tax_rate(tax_rate)?;

    let mut trace = PricingTrace::default();
    let hundred = Decimal::new(100, 0);

    let base = configuration.project_type.base_price;
    trace.push("base_price", configuration.project_type.name.clone(), base);

    let supplement = configuration.design.price_supplement;
    trace.push("design_supplement", configuration.design.name.clone(), supplement);

    let multiplier = configuration.complexity.multiplier;
    let multiplied = (base + supplement) * multiplier;
    trace.push(
        "complexity_multiplier",
        format!("{} x{multiplier}", configuration.complexity.name),
        multiplied,
    );

    let mut one_time = Decimal::ZERO;
    let mut monthly = Decimal::ZERO;
    let mut yearly = Decimal::ZERO;
    for option in &configuration.options {
        match option.cadence {
            BillingCadence::OneTime => one_time += option.price,
            BillingCadence::Monthly => monthly += option.price,
            BillingCadence::Yearly => yearly += option.price,
        }
        trace.push("option", format!("{} ({})", option.name, option.cadence), option.price);
    }

    let subtotal = round_money(multiplied + one_time);
    trace.push("subtotal", "one-time total before discount and tax", subtotal);

    let discount_total = match discount {
        Some(discount) => apply_discount(discount, subtotal)?,
        None => Decimal::ZERO,
    };
    if let Some(discount) = discount {
        let detail = discount.reason.clone().unwrap_or_else(|| discount.kind.to_string());
        trace.push("discount", detail, discount_total);
    }

    let net_total = subtotal - discount_total;
    let tax_total = round_money(net_total * tax_rate / hundred);
    trace.push("tax", format!("{tax_rate}%"), tax_total);

    let total = net_total + tax_total;
    trace.push("total", "tax-inclusive total", total);

    let installments = split_installments(total);

    let breakdown = PriceBreakdown {
        subtotal,
        discount_total,
        net_total,
        tax_total,
        total,
        installments,
        monthly_total: round_money(monthly),
        yearly_total: round_money(yearly),
        duration_days: estimate_duration_days(configuration)?,
    };
    Ok((breakdown, trace))
}

fn ensure_tax_rate(tax_rate: Decimal) -> Result<(), DomainError> {
    let hundred = Decimal::new(100, 0);
    if tax_rate < Decimal::ZERO || tax_rate > hundred {
        return Err(DomainError::InvalidTaxRate(format!(
            "tax rate must be between 0 and 100, got {tax_rate}"
        )));
    }
    Ok(())
}

fn apply_discount(discount: &Discount, subtotal: Decimal) -> Result<Decimal, DomainError> {
    let hundred = Decimal::new(100, 0);
    if discount.value < Decimal::ZERO {
        return Err(DomainError::InvalidDiscount(format!(
            "discount value must not be negative, got {}",
            discount.value
        )));
    }
    match discount.kind {
        DiscountKind::Percent => {
            if discount.value > hundred {
                return Err(DomainError::InvalidDiscount(format!(
                    "percentage discount must be between 0 and 100, got {}",
                    discount.value
                )));
            }
            Ok(round_money(subtotal * discount.value / hundred))
        }
        DiscountKind::Fixed => {
            let amount = round_money(discount.value);
            if amount > subtotal {
                return Err(DomainError::InvalidDiscount(format!(
                    "fixed discount {amount} exceeds subtotal {subtotal}"
                )));
            }
            Ok(amount)
        }
    }
}

fn split_installments(total: Decimal) -> InstallmentPlan {
    let thirty = Decimal::new(30, 2);
    let forty = Decimal::new(40, 2);
    InstallmentPlan {
        deposit: round_money(total * thirty),
        midpoint: round_money(total * forty),
        balance: round_money(total * thirty),
    }
}

fn estimate_duration_days(configuration: &QuoteConfiguration) -> Result<u32, DomainError> {
    let days = Decimal::from(configuration.project_type.estimated_days)
        * configuration.complexity.multiplier;
    days.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "estimated duration {days} is not representable in whole days"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{
        ComplexityLevel, ComplexityLevelId, DesignOption, DesignOptionId, OptionId, ProjectType,
        ProjectTypeId, SupplementaryOption,
    };

    fn configuration(
        base_price: Decimal,
        supplement: Decimal,
        multiplier: Decimal,
        estimated_days: u32,
    ) -> QuoteConfiguration {
        QuoteConfiguration {
            project_type: ProjectType {
                id: ProjectTypeId("site-vitrine".to_owned()),
                name: "Site Vitrine".to_owned(),
                description: String::new(),
                base_price,
                estimated_days,
                active: true,
            },
            design: DesignOption {
                id: DesignOptionId("design-moderne".to_owned()),
                name: "Design Moderne".to_owned(),
                price_supplement: supplement,
                active: true,
            },
            complexity: ComplexityLevel {
                id: ComplexityLevelId("complexity-simple".to_owned()),
                name: "Simple".to_owned(),
                multiplier,
                active: true,
            },
            options: Vec::new(),
        }
    }

    fn option(name: &str, price: Decimal, cadence: BillingCadence) -> SupplementaryOption {
        SupplementaryOption {
            id: OptionId(format!("option-{}", name.to_lowercase().replace(' ', "-"))),
            name: name.to_owned(),
            description: String::new(),
            price,
            cadence,
            active: true,
        }
    }

    fn money(units: i64) -> Decimal {
        Decimal::new(units * 100, 2)
    }

    #[test]
    fn base_plus_design_with_flat_multiplier_and_tax() {
        let config = configuration(money(1_000), money(500), Decimal::new(100, 2), 10);
        let breakdown = price(&config, None, Decimal::new(20, 0)).unwrap();

        assert_eq!(breakdown.subtotal, money(1_500));
        assert_eq!(breakdown.discount_total, Decimal::ZERO);
        assert_eq!(breakdown.net_total, money(1_500));
        assert_eq!(breakdown.tax_total, money(300));
        assert_eq!(breakdown.total, money(1_800));
        assert_eq!(breakdown.installments.deposit, money(540));
        assert_eq!(breakdown.installments.midpoint, money(720));
        assert_eq!(breakdown.installments.balance, money(540));
        assert_eq!(breakdown.duration_days, 10);
    }

    #[test]
    fn percentage_discount_applies_before_tax() {
        let config = configuration(money(1_000), money(500), Decimal::new(100, 2), 10);
        let discount = Discount {
            kind: DiscountKind::Percent,
            value: Decimal::new(10, 0),
            reason: Some("returning client".to_owned()),
        };
        let breakdown = price(&config, Some(&discount), Decimal::new(20, 0)).unwrap();

        assert_eq!(breakdown.discount_total, money(150));
        assert_eq!(breakdown.net_total, money(1_350));
        assert_eq!(breakdown.tax_total, money(270));
        assert_eq!(breakdown.total, money(1_620));
    }

    #[test]
    fn fixed_discount_above_subtotal_is_rejected() {
        let config = configuration(money(1_000), money(500), Decimal::new(100, 2), 10);
        let discount =
            Discount { kind: DiscountKind::Fixed, value: money(2_000), reason: None };
        let error = price(&config, Some(&discount), Decimal::new(20, 0)).unwrap_err();

        assert!(matches!(
            error,
            DomainError::InvalidDiscount(ref message) if message.contains("exceeds subtotal")
        ));
    }

    #[test]
    fn percentage_discount_outside_bounds_is_rejected() {
        let config = configuration(money(1_000), money(500), Decimal::new(100, 2), 10);
        for value in [Decimal::new(120, 0), Decimal::new(-5, 0)] {
            let discount = Discount { kind: DiscountKind::Percent, value, reason: None };
            let error = price(&config, Some(&discount), Decimal::new(20, 0)).unwrap_err();
            assert!(matches!(error, DomainError::InvalidDiscount(_)));
        }
    }

    #[test]
    fn multiplier_applies_before_one_time_options() {
        let mut config = configuration(money(1_000), Decimal::ZERO, Decimal::new(150, 2), 10);
        config.options.push(option("Maintenance Setup", money(100), BillingCadence::OneTime));

        let breakdown = price(&config, None, Decimal::ZERO).unwrap();

        assert_eq!(breakdown.subtotal, money(1_600));
    }

    #[test]
    fn recurring_options_stay_out_of_the_subtotal() {
        let mut config = configuration(money(1_000), Decimal::ZERO, Decimal::new(100, 2), 10);
        config.options.push(option("SEO Pack", money(300), BillingCadence::OneTime));
        config.options.push(option("Hosting", money(25), BillingCadence::Monthly));
        config.options.push(option("Domain", money(15), BillingCadence::Yearly));

        let breakdown = price(&config, None, Decimal::ZERO).unwrap();

        assert_eq!(breakdown.subtotal, money(1_300));
        assert_eq!(breakdown.monthly_total, money(25));
        assert_eq!(breakdown.yearly_total, money(15));
    }

    #[test]
    fn identical_inputs_produce_identical_breakdowns() {
        let mut config = configuration(money(8_000), money(800), Decimal::new(250, 2), 40);
        config.options.push(option("SEO Pack", money(300), BillingCadence::OneTime));
        let discount = Discount {
            kind: DiscountKind::Percent,
            value: Decimal::new(15, 0),
            reason: None,
        };

        let first = price(&config, Some(&discount), Decimal::new(20, 0)).unwrap();
        let second = price(&config, Some(&discount), Decimal::new(20, 0)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn installments_round_independently_without_reconciliation() {
        let config =
            configuration(Decimal::new(10_001, 2), Decimal::ZERO, Decimal::new(100, 2), 5);
        let breakdown = price(&config, None, Decimal::ZERO).unwrap();

        assert_eq!(breakdown.total, Decimal::new(10_001, 2));
        assert_eq!(breakdown.installments.deposit, money(30));
        assert_eq!(breakdown.installments.midpoint, money(40));
        assert_eq!(breakdown.installments.balance, money(30));

        let drift = (breakdown.installments.sum() - breakdown.total).abs();
        assert!(drift <= Decimal::new(2, 2), "drift {drift} exceeds two cents");
    }

    #[test]
    fn duration_rounds_half_days_away_from_zero() {
        let config = configuration(money(1_000), Decimal::ZERO, Decimal::new(150, 2), 7);
        let breakdown = price(&config, None, Decimal::ZERO).unwrap();

        assert_eq!(breakdown.duration_days, 11);
    }

    #[test]
    fn invalid_tax_rate_is_rejected() {
        let config = configuration(money(1_000), Decimal::ZERO, Decimal::new(100, 2), 10);
        for rate in [Decimal::new(-1, 0), Decimal::new(101, 0)] {
            let error = price(&config, None, rate).unwrap_err();
            assert!(matches!(error, DomainError::InvalidTaxRate(_)));
        }
    }

    #[test]
    fn trace_records_every_contributing_stage() {
        let mut config = configuration(money(1_000), money(500), Decimal::new(100, 2), 10);
        config.options.push(option("SEO Pack", money(300), BillingCadence::OneTime));
        let discount = Discount {
            kind: DiscountKind::Percent,
            value: Decimal::new(10, 0),
            reason: Some("launch promotion".to_owned()),
        };

        let (_, trace) = price_with_trace(&config, Some(&discount), Decimal::new(20, 0)).unwrap();
        let stages: Vec<&str> = trace.steps.iter().map(|step| step.stage).collect();

        assert_eq!(
            stages,
            vec![
                "base_price",
                "design_supplement",
                "complexity_multiplier",
                "option",
                "subtotal",
                "discount",
                "tax",
                "total",
            ]
        );
        let discount_step = trace.steps.iter().find(|step| step.stage == "discount").unwrap();
        assert_eq!(discount_step.detail, "launch promotion");
        assert_eq!(discount_step.amount, money(180));
    }
}
