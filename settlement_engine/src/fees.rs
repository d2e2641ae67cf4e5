//! # Fee calculator
//!
//! Turns raw order inputs into a [`FeeBreakdown`]. The calculator is pure: it holds an injected [`FeeConfig`] and
//! nothing else.
//!
//! The breakdown is assembled in a fixed order:
//! 1. Tax is computed on the subtotal and rounded once, to the cent.
//! 2. Delivery orders add the carrier delivery fee and the flat merchant fee. Pickup orders add neither.
//! 3. The tip passes through unmodified.
//! 4. A discount reduces the food + tax portion only, and is capped at that portion.
//! 5. The processor fee is computed last, on the chargeable sum of everything above, and added back in.
//!
//! Discounts applied after creation go through [`FeeCalculator::apply_discount`], which recomputes the processor fee
//! on the new chargeable amount. The fee is never prorated.
use log::*;
use serde::{Deserialize, Serialize};
use settle_common::{Cents, CentsConversionError, Rate, RateError};
use thiserror::Error;

use crate::db_types::OrderType;

pub const DEFAULT_PROCESSOR_RATE: Rate = Rate::from_ppm(29_000);
pub const DEFAULT_PROCESSOR_FIXED_FEE: i64 = 30;
pub const DEFAULT_MERCHANT_FEE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("Invalid fee input: {0}")]
    ValidationError(String),
}

impl From<CentsConversionError> for FeeError {
    fn from(e: CentsConversionError) -> Self {
        Self::ValidationError(e.to_string())
    }
}

impl From<RateError> for FeeError {
    fn from(e: RateError) -> Self {
        Self::ValidationError(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// The percentage part of the card-processing fee.
    pub processor_rate: Rate,
    /// The fixed part of the card-processing fee, charged once per non-zero charge.
    pub processor_fixed: Cents,
    /// The merchant fee for delivery orders when the tenant has not configured one.
    pub default_merchant_fee: Cents,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            processor_rate: DEFAULT_PROCESSOR_RATE,
            processor_fixed: Cents::from(DEFAULT_PROCESSOR_FIXED_FEE),
            default_merchant_fee: Cents::from(DEFAULT_MERCHANT_FEE),
        }
    }
}

//--------------------------------------       FeeInput        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeInput {
    pub order_type: OrderType,
    pub subtotal: Cents,
    pub tax_rate: Rate,
    pub delivery_fee: Cents,
    pub tip: Cents,
    pub discount: Cents,
    /// Overrides [`FeeConfig::default_merchant_fee`], typically with the tenant's configured fee.
    pub merchant_fee: Option<Cents>,
}

impl FeeInput {
    pub fn new(order_type: OrderType, subtotal: Cents, tax_rate: Rate) -> Self {
        Self {
            order_type,
            subtotal,
            tax_rate,
            delivery_fee: Cents::ZERO,
            tip: Cents::ZERO,
            discount: Cents::ZERO,
            merchant_fee: None,
        }
    }

    /// Builds an input from boundary values: a decimal-dollar subtotal, minor-unit delivery fee and tip, and a tax
    /// rate in percent.
    pub fn from_dollars(
        subtotal: f64,
        order_type: OrderType,
        delivery_fee: Option<i64>,
        tip: Option<i64>,
        tax_rate_pct: f64,
    ) -> Result<Self, FeeError> {
        let subtotal = Cents::try_from_dollars(subtotal)?;
        let tax_rate = Rate::from_percent(tax_rate_pct)?;
        let delivery_fee = non_negative_cents("delivery fee", delivery_fee)?;
        let tip = non_negative_cents("tip", tip)?;
        Ok(Self::new(order_type, subtotal, tax_rate).with_delivery_fee(delivery_fee).with_tip(tip))
    }

    pub fn with_delivery_fee(mut self, fee: Cents) -> Self {
        self.delivery_fee = fee;
        self
    }

    pub fn with_tip(mut self, tip: Cents) -> Self {
        self.tip = tip;
        self
    }

    pub fn with_discount(mut self, discount: Cents) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_merchant_fee(mut self, fee: Cents) -> Self {
        self.merchant_fee = Some(fee);
        self
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        let amounts = [
            ("subtotal", self.subtotal),
            ("delivery fee", self.delivery_fee),
            ("tip", self.tip),
            ("discount", self.discount),
            ("merchant fee", self.merchant_fee.unwrap_or_default()),
        ];
        if let Some((name, v)) = amounts.iter().find(|(_, v)| v.is_negative()) {
            return Err(FeeError::ValidationError(format!("The {name} cannot be negative ({v})")));
        }
        if let Some((name, v)) = amounts.iter().find(|(_, v)| v.exceeds_max_amount()) {
            return Err(FeeError::ValidationError(format!("The {name} of {v} is larger than {}", Cents::MAX_AMOUNT)));
        }
        if self.tax_rate.ppm() < 0 {
            return Err(FeeError::ValidationError(format!("The tax rate cannot be negative ({})", self.tax_rate)));
        }
        Ok(())
    }
}

fn non_negative_cents(name: &str, value: Option<i64>) -> Result<Cents, FeeError> {
    match value {
        Some(v) if v < 0 => Err(FeeError::ValidationError(format!("The {name} cannot be negative ({v})"))),
        Some(v) => Ok(Cents::from(v)),
        None => Ok(Cents::ZERO),
    }
}

//--------------------------------------     FeeBreakdown      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub subtotal: Cents,
    pub tax: Cents,
    pub delivery_fee: Cents,
    pub merchant_fee: Cents,
    pub tip: Cents,
    pub discount: Cents,
    pub processor_fee: Cents,
    pub total: Cents,
}

impl FeeBreakdown {
    /// The part of the order a discount may reduce.
    pub fn food_and_tax(&self) -> Cents {
        self.subtotal + self.tax
    }

    /// The amount billed to the card before the processor fee is added.
    pub fn chargeable_amount(&self) -> Cents {
        self.subtotal + self.tax + self.delivery_fee + self.merchant_fee + self.tip - self.discount
    }

    /// `total == subtotal + tax + delivery_fee + merchant_fee + tip + processor_fee - discount`, and the discount
    /// never exceeds food + tax.
    pub fn is_consistent(&self) -> bool {
        self.total == self.chargeable_amount() + self.processor_fee &&
            self.discount <= self.food_and_tax() &&
            !self.discount.is_negative()
    }
}

//--------------------------------------     FeeCalculator     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeCalculator {
    config: FeeConfig,
}

impl FeeCalculator {
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Computes a breakdown from boundary values. See [`FeeInput::from_dollars`].
    pub fn compute_fees(
        &self,
        subtotal: f64,
        order_type: OrderType,
        delivery_fee: Option<i64>,
        tip: Option<i64>,
        tax_rate_pct: f64,
    ) -> Result<FeeBreakdown, FeeError> {
        let input = FeeInput::from_dollars(subtotal, order_type, delivery_fee, tip, tax_rate_pct)?;
        self.compute(&input)
    }

    pub fn compute(&self, input: &FeeInput) -> Result<FeeBreakdown, FeeError> {
        input.validate()?;
        let tax = input.tax_rate.apply_to(input.subtotal);
        let (delivery_fee, merchant_fee) = match input.order_type {
            OrderType::Delivery => {
                (input.delivery_fee, input.merchant_fee.unwrap_or(self.config.default_merchant_fee))
            },
            OrderType::Pickup => (Cents::ZERO, Cents::ZERO),
        };
        let mut breakdown = FeeBreakdown {
            subtotal: input.subtotal,
            tax,
            delivery_fee,
            merchant_fee,
            tip: input.tip,
            discount: Cents::ZERO,
            processor_fee: Cents::ZERO,
            total: Cents::ZERO,
        };
        breakdown.discount = self.cap_discount(&breakdown, input.discount);
        self.finalise(&mut breakdown);
        trace!("🧾️ Fees computed: {breakdown:?}");
        Ok(breakdown)
    }

    /// Applies an additional stored-value discount to an existing breakdown.
    ///
    /// Discounts accumulate. The cumulative discount is capped at food + tax, and the processor fee is recomputed on the
    /// new chargeable amount.
    pub fn apply_discount(&self, current: &FeeBreakdown, additional: Cents) -> Result<FeeBreakdown, FeeError> {
        if additional.is_negative() {
            return Err(FeeError::ValidationError(format!("The discount cannot be negative ({additional})")));
        }
        if additional.exceeds_max_amount() {
            let max = Cents::MAX_AMOUNT;
            return Err(FeeError::ValidationError(format!("The discount of {additional} is larger than {max}")));
        }
        let mut breakdown = *current;
        let requested = current.discount + additional;
        breakdown.discount = self.cap_discount(current, requested);
        if breakdown.discount < requested {
            debug!(
                "🧾️ Discount of {requested} exceeds the food and tax portion of {}. Capping it.",
                current.food_and_tax()
            );
        }
        self.finalise(&mut breakdown);
        trace!("🧾️ Fees recomputed after discount: {breakdown:?}");
        Ok(breakdown)
    }

    /// `round_half_up(chargeable × pct) + fixed`, or zero when nothing is charged.
    pub fn processor_fee(&self, chargeable: Cents) -> Cents {
        if chargeable.value() <= 0 {
            return Cents::ZERO;
        }
        self.config.processor_rate.apply_to(chargeable) + self.config.processor_fixed
    }

    fn cap_discount(&self, breakdown: &FeeBreakdown, discount: Cents) -> Cents {
        discount.min(breakdown.food_and_tax())
    }

    fn finalise(&self, breakdown: &mut FeeBreakdown) {
        let chargeable = breakdown.chargeable_amount();
        breakdown.processor_fee = self.processor_fee(chargeable);
        breakdown.total = chargeable + breakdown.processor_fee;
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn calculator() -> FeeCalculator {
        FeeCalculator::default()
    }

    #[test]
    fn pickup_order_golden() {
        let b = calculator().compute_fees(100.00, OrderType::Pickup, None, None, 10.25).unwrap();
        assert_eq!(b.tax, Cents::from(1025));
        assert_eq!(b.delivery_fee, Cents::ZERO);
        assert_eq!(b.merchant_fee, Cents::ZERO);
        assert_eq!(b.chargeable_amount(), Cents::from(11_025));
        // 110.25 * 2.9% = 3.19725 -> 3.20, + 0.30
        assert_eq!(b.processor_fee, Cents::from(350));
        assert_eq!(b.total, Cents::from(11_375));
        assert!(b.is_consistent());
    }

    #[test]
    fn pickup_orders_ignore_delivery_fees() {
        let b = calculator().compute_fees(100.00, OrderType::Pickup, Some(499), None, 10.25).unwrap();
        assert_eq!(b.delivery_fee, Cents::ZERO);
        assert_eq!(b.merchant_fee, Cents::ZERO);
        assert_eq!(b.total, Cents::from(11_375));
    }

    #[test]
    fn delivery_order_golden() {
        let b = calculator().compute_fees(100.00, OrderType::Delivery, Some(499), Some(500), 10.25).unwrap();
        assert_eq!(b.delivery_fee, Cents::from(499));
        assert_eq!(b.merchant_fee, Cents::from(100));
        assert_eq!(b.tip, Cents::from(500));
        assert_eq!(b.chargeable_amount(), Cents::from(12_124));
        // 121.24 * 2.9% = 3.51596 -> 3.52, + 0.30
        assert_eq!(b.processor_fee, Cents::from(382));
        assert_eq!(b.total, Cents::from(12_506));
        assert!(b.is_consistent());
    }

    #[test]
    fn tenant_merchant_fee_overrides_default() {
        let input = FeeInput::new(OrderType::Delivery, Cents::from(1000), Rate::default())
            .with_merchant_fee(Cents::from(250));
        let b = calculator().compute(&input).unwrap();
        assert_eq!(b.merchant_fee, Cents::from(250));
        assert_eq!(b.chargeable_amount(), Cents::from(1250));
    }

    #[test]
    fn discount_recomputes_processor_fee() {
        let calc = calculator();
        let b = calc.compute_fees(100.00, OrderType::Pickup, None, None, 10.25).unwrap();
        let discounted = calc.apply_discount(&b, Cents::from(2000)).unwrap();
        assert_eq!(discounted.discount, Cents::from(2000));
        assert_eq!(discounted.chargeable_amount(), Cents::from(9025));
        // 90.25 * 2.9% = 2.61725 -> 2.62, + 0.30. Not a prorated share of the original 3.50.
        assert_eq!(discounted.processor_fee, Cents::from(292));
        assert_eq!(discounted.total, Cents::from(9317));
        assert!(discounted.is_consistent());
    }

    #[test]
    fn discount_never_touches_delivery_fees() {
        let calc = calculator();
        let b = calc.compute_fees(10.00, OrderType::Delivery, Some(499), Some(200), 0.0).unwrap();
        let discounted = calc.apply_discount(&b, Cents::from(5000)).unwrap();
        assert_eq!(discounted.discount, Cents::from(1000));
        assert_eq!(discounted.delivery_fee, Cents::from(499));
        assert_eq!(discounted.merchant_fee, Cents::from(100));
        assert_eq!(discounted.chargeable_amount(), Cents::from(799));
        assert!(discounted.is_consistent());
    }

    #[test]
    fn discounts_accumulate() {
        let calc = calculator();
        let b = calc.compute_fees(50.00, OrderType::Pickup, None, None, 0.0).unwrap();
        let once = calc.apply_discount(&b, Cents::from(1000)).unwrap();
        let twice = calc.apply_discount(&once, Cents::from(1500)).unwrap();
        assert_eq!(twice.discount, Cents::from(2500));
        let direct = FeeInput::new(OrderType::Pickup, Cents::from(5000), Rate::default()).with_discount(Cents::from(2500));
        assert_eq!(twice, calc.compute(&direct).unwrap());
    }

    #[test]
    fn fully_discounted_order_has_no_processor_fee() {
        let calc = calculator();
        let b = calc.compute_fees(20.00, OrderType::Pickup, None, None, 0.0).unwrap();
        let discounted = calc.apply_discount(&b, Cents::from(2000)).unwrap();
        assert_eq!(discounted.processor_fee, Cents::ZERO);
        assert_eq!(discounted.total, Cents::ZERO);
        let zero = calc.compute_fees(0.0, OrderType::Pickup, None, None, 8.0).unwrap();
        assert_eq!(zero.total, Cents::ZERO);
    }

    #[test]
    fn rejects_malformed_input() {
        let calc = calculator();
        assert!(calc.compute_fees(-1.0, OrderType::Pickup, None, None, 10.0).is_err());
        assert!(calc.compute_fees(f64::NAN, OrderType::Pickup, None, None, 10.0).is_err());
        assert!(calc.compute_fees(10.0, OrderType::Pickup, None, None, f64::INFINITY).is_err());
        assert!(calc.compute_fees(10.0, OrderType::Pickup, None, None, -5.0).is_err());
        assert!(calc.compute_fees(10.0, OrderType::Delivery, Some(-1), None, 5.0).is_err());
        assert!(calc.compute_fees(10.0, OrderType::Pickup, None, Some(-100), 5.0).is_err());
        assert!(calc.compute_fees(10.001, OrderType::Pickup, None, None, 5.0).is_err());
        let b = calc.compute_fees(10.0, OrderType::Pickup, None, None, 5.0).unwrap();
        assert!(matches!(calc.apply_discount(&b, Cents::from(-1)), Err(FeeError::ValidationError(_))));
    }

    #[test]
    fn custom_processor_config() {
        let calc = FeeCalculator::new(FeeConfig {
            processor_rate: Rate::from_ppm(35_000),
            processor_fixed: Cents::from(15),
            default_merchant_fee: Cents::from(0),
        });
        let b = calc.compute_fees(100.00, OrderType::Delivery, Some(0), None, 0.0).unwrap();
        assert_eq!(b.merchant_fee, Cents::ZERO);
        assert_eq!(b.processor_fee, Cents::from(365));
    }

    #[test]
    fn absurd_amounts_are_rejected() {
        let calc = calculator();
        let huge = FeeInput::new(OrderType::Pickup, Cents::from(i64::MAX / 2), Rate::from_ppm(102_500));
        assert!(matches!(calc.compute(&huge), Err(FeeError::ValidationError(_))));
        let tip =
            FeeInput::new(OrderType::Delivery, Cents::from(1_000), Rate::default()).with_tip(Cents::from(i64::MAX));
        assert!(matches!(calc.compute(&tip), Err(FeeError::ValidationError(_))));
        assert!(calc.compute_fees(20_000_000.00, OrderType::Pickup, None, None, 0.0).is_err());
        let largest = FeeInput::new(OrderType::Delivery, Cents::MAX_AMOUNT, Rate::from_ppm(102_500))
            .with_delivery_fee(Cents::MAX_AMOUNT)
            .with_tip(Cents::MAX_AMOUNT);
        let b = calc.compute(&largest).unwrap();
        assert!(b.is_consistent());
        assert!(matches!(calc.apply_discount(&b, Cents::from(i64::MAX)), Err(FeeError::ValidationError(_))));
    }

    proptest! {
        #[test]
        fn breakdown_is_always_consistent(
            subtotal in 0i64..5_000_000,
            delivery in 0i64..50_000,
            tip in 0i64..100_000,
            discount in 0i64..6_000_000,
            tax_ppm in 0u32..300_000,
            delivery_order in any::<bool>(),
        ) {
            let order_type = if delivery_order { OrderType::Delivery } else { OrderType::Pickup };
            let calc = FeeCalculator::default();
            let input = FeeInput::new(order_type, Cents::from(subtotal), Rate::from_ppm(tax_ppm))
                .with_delivery_fee(Cents::from(delivery))
                .with_tip(Cents::from(tip));
            let b = calc.compute(&input).unwrap();
            prop_assert!(b.is_consistent());
            let discounted = calc.apply_discount(&b, Cents::from(discount)).unwrap();
            prop_assert!(discounted.is_consistent());
            prop_assert!(discounted.total <= b.total);
            prop_assert!(!discounted.processor_fee.is_negative());
            prop_assert_eq!(discounted.delivery_fee, b.delivery_fee);
            prop_assert_eq!(discounted.merchant_fee, b.merchant_fee);
        }
    }
}
