//! Landed-cost and selling-price calculation.
//!
//! ```text
//! landed_cost   = base_price + weight_kg × shipping_rate(origin)
//! tax           = landed_cost × tax_rate
//! cost_basis    = landed_cost + tax
//! profit        = cost_basis × markup_percent / 100
//! selling_price = round2(cost_basis + profit)        (half-up)
//! ```
//!
//! Every function here is pure. Rates come from an injected
//! [`PricingConfig`] so rate schedules can be versioned and tested without
//! code changes.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Where a product ships from. Determines the per-kilogram shipping rate.
///
/// Codes are normalized to upper case. Origins missing from the rate table
/// are accepted and priced at rate 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ShippingOrigin(String);

impl ShippingOrigin {
    pub const AMAZON_UAE: &'static str = "AMAZON_UAE";
    pub const ALIBABA: &'static str = "ALIBABA";
    pub const ALIEXPRESS: &'static str = "ALIEXPRESS";
    pub const NONE: &'static str = "NONE";

    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// The origin of locally stocked goods (no shipping surcharge).
    pub fn none() -> Self {
        Self(Self::NONE.to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl From<String> for ShippingOrigin {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ShippingOrigin {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ShippingOrigin> for String {
    fn from(origin: ShippingOrigin) -> Self {
        origin.0
    }
}

impl std::fmt::Display for ShippingOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tax rate and shipping-rate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fraction applied to the landed cost (0.05 = 5%).
    pub tax_rate: Decimal,

    /// Per-kilogram shipping rate by origin code.
    pub shipping_rates: BTreeMap<String, Decimal>,
}

impl PricingConfig {
    /// Replaces the tax rate.
    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Sets (or adds) the rate for an origin.
    pub fn with_shipping_rate(mut self, origin: impl AsRef<str>, rate: Decimal) -> Self {
        self.shipping_rates
            .insert(ShippingOrigin::new(origin).0, rate);
        self
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let shipping_rates = BTreeMap::from([
            (ShippingOrigin::AMAZON_UAE.to_string(), Decimal::from(12)),
            (ShippingOrigin::ALIBABA.to_string(), Decimal::from(15)),
            (ShippingOrigin::ALIEXPRESS.to_string(), Decimal::from(18)),
            (ShippingOrigin::NONE.to_string(), Decimal::ZERO),
        ]);

        Self {
            tax_rate: Decimal::new(5, 2),
            shipping_rates,
        }
    }
}

/// Every intermediate value of a price calculation for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub weight_kg: Decimal,
    pub origin: ShippingOrigin,
    pub shipping_rate: Decimal,
    pub landed_cost: Decimal,
    pub tax: Decimal,
    pub cost_basis: Decimal,
    pub markup_percent: Decimal,
    pub profit: Decimal,
    /// Rounded to two decimal places, half-up.
    pub selling_price: Decimal,
}

/// Computes prices against a rate schedule.
#[derive(Debug, Clone, Default)]
pub struct PricingCalculator {
    config: PricingConfig,
}

impl PricingCalculator {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Per-kilogram shipping rate for an origin.
    ///
    /// Unknown origins fall back to 0 instead of failing.
    pub fn shipping_rate(&self, origin: &ShippingOrigin) -> Decimal {
        match self.config.shipping_rates.get(origin.code()) {
            Some(rate) => *rate,
            None => {
                tracing::warn!(origin = %origin, "unknown shipping origin, using rate 0");
                metrics::counter!("pricing_unknown_origin_total").increment(1);
                Decimal::ZERO
            }
        }
    }

    /// `base_price + weight_kg × shipping_rate(origin)`.
    pub fn landed_cost(
        &self,
        base_price: Decimal,
        weight_kg: Decimal,
        origin: &ShippingOrigin,
    ) -> Decimal {
        base_price + weight_kg * self.shipping_rate(origin)
    }

    /// Tax-inclusive, marked-up unit price rounded half-up to 2 places.
    pub fn selling_price(
        &self,
        base_price: Decimal,
        weight_kg: Decimal,
        origin: &ShippingOrigin,
        markup_percent: Decimal,
    ) -> Decimal {
        self.breakdown(base_price, weight_kg, origin, markup_percent)
            .selling_price
    }

    /// Full calculation with all intermediate values.
    pub fn breakdown(
        &self,
        base_price: Decimal,
        weight_kg: Decimal,
        origin: &ShippingOrigin,
        markup_percent: Decimal,
    ) -> PriceBreakdown {
        let shipping_rate = self.shipping_rate(origin);
        let landed_cost = base_price + weight_kg * shipping_rate;
        let tax = landed_cost * self.config.tax_rate;
        let cost_basis = landed_cost + tax;
        let profit = cost_basis * markup_percent / Decimal::ONE_HUNDRED;
        let selling_price = round2(cost_basis + profit);

        PriceBreakdown {
            base_price,
            weight_kg,
            origin: origin.clone(),
            shipping_rate,
            landed_cost,
            tax,
            cost_basis,
            markup_percent,
            profit,
            selling_price,
        }
    }
}

/// Rounds to two decimal places, midpoint away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_reference_price() {
        let calc = PricingCalculator::default();
        let b = calc.breakdown(dec("100"), dec("1"), &"AMAZON_UAE".into(), dec("20"));

        assert_eq!(b.landed_cost, dec("112"));
        assert_eq!(b.tax, dec("5.6"));
        assert_eq!(b.cost_basis, dec("117.6"));
        assert_eq!(b.profit, dec("23.52"));
        assert_eq!(b.selling_price, dec("141.12"));
        assert_eq!(
            calc.selling_price(dec("100"), dec("1"), &"AMAZON_UAE".into(), dec("20")),
            dec("141.12")
        );
    }

    #[test]
    fn test_default_rate_table() {
        let calc = PricingCalculator::default();
        assert_eq!(calc.shipping_rate(&"AMAZON_UAE".into()), dec("12"));
        assert_eq!(calc.shipping_rate(&"ALIBABA".into()), dec("15"));
        assert_eq!(calc.shipping_rate(&"ALIEXPRESS".into()), dec("18"));
        assert_eq!(calc.shipping_rate(&ShippingOrigin::none()), Decimal::ZERO);
    }

    #[test]
    fn test_origin_codes_are_case_insensitive() {
        let calc = PricingCalculator::default();
        assert_eq!(calc.shipping_rate(&" alibaba ".into()), dec("15"));
    }

    #[test]
    fn test_zero_weight_landed_cost_is_base_price() {
        let calc = PricingCalculator::default();
        assert_eq!(
            calc.landed_cost(dec("100"), Decimal::ZERO, &ShippingOrigin::none()),
            dec("100")
        );
        assert_eq!(
            calc.landed_cost(dec("100"), Decimal::ZERO, &"NOT_A_REAL_ORIGIN".into()),
            dec("100")
        );
    }

    #[test]
    fn test_unknown_origin_falls_back_to_rate_zero() {
        let calc = PricingCalculator::default();
        let origin = ShippingOrigin::new("EBAY");

        assert_eq!(calc.shipping_rate(&origin), Decimal::ZERO);
        assert_eq!(calc.landed_cost(dec("80"), dec("3.5"), &origin), dec("80"));
    }

    #[test]
    fn test_selling_price_rounds_half_up() {
        // 10.00 landed, 5% tax -> 10.50, 0.1% markup -> 10.5105 -> 10.51
        let calc = PricingCalculator::default();
        assert_eq!(
            calc.selling_price(dec("10"), Decimal::ZERO, &ShippingOrigin::none(), dec("0.1")),
            dec("10.51")
        );
        // Exact midpoint: 0.125 rounds up to 0.13 with no tax and no markup.
        let untaxed = PricingCalculator::new(PricingConfig::default().with_tax_rate(Decimal::ZERO));
        assert_eq!(
            untaxed.selling_price(dec("0.125"), Decimal::ZERO, &ShippingOrigin::none(), Decimal::ZERO),
            dec("0.13")
        );
    }

    #[test]
    fn test_injected_rate_schedule() {
        let config = PricingConfig::default()
            .with_tax_rate(dec("0.10"))
            .with_shipping_rate("alibaba", dec("20"))
            .with_shipping_rate("SHEIN", dec("9"));
        let calc = PricingCalculator::new(config);

        assert_eq!(calc.landed_cost(dec("10"), dec("1"), &"ALIBABA".into()), dec("30"));
        assert_eq!(calc.landed_cost(dec("10"), dec("2"), &"SHEIN".into()), dec("28"));
        // 28 * 1.10 = 30.80, no markup
        assert_eq!(
            calc.selling_price(dec("10"), dec("2"), &"SHEIN".into(), Decimal::ZERO),
            dec("30.8")
        );
    }

    #[test]
    fn test_origin_serializes_as_code() {
        let origin = ShippingOrigin::new("aliexpress");
        let json = serde_json::to_string(&origin).unwrap();
        assert_eq!(json, "\"ALIEXPRESS\"");
        let back: ShippingOrigin = serde_json::from_str("\"amazon_uae\"").unwrap();
        assert_eq!(back.code(), ShippingOrigin::AMAZON_UAE);
    }

    proptest! {
        #[test]
        fn selling_price_never_below_landed_cost(
            base_cents in 10i64..10_000_000,
            weight_grams in 0i64..100_000,
            markup_basis_points in 0i64..100_000,
            origin in prop::sample::select(vec!["AMAZON_UAE", "ALIBABA", "ALIEXPRESS", "NONE", "UNLISTED"]),
        ) {
            let calc = PricingCalculator::default();
            let base = Decimal::new(base_cents, 2);
            let weight = Decimal::new(weight_grams, 3);
            let markup = Decimal::new(markup_basis_points, 2);
            let origin = ShippingOrigin::new(origin);

            let landed = calc.landed_cost(base, weight, &origin);
            let price = calc.selling_price(base, weight, &origin, markup);
            prop_assert!(price >= landed, "price {} < landed {}", price, landed);
        }
    }
}
