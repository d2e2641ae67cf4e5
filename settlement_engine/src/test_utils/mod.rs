//! Helpers for tests in this crate and in crates that depend on it (enable the `test_utils` feature).
use chrono::Utc;
use settle_common::{Cents, Rate};

use crate::db_types::{Order, OrderId, OrderStatusType, OrderType, PaymentStatusType};

#[cfg(feature = "sqlite")]
pub mod prepare_env;

/// A $100.00 pickup order at 10.25% tax, pending and unpaid, as it would be stored straight after creation.
pub fn sample_order() -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::from("ord_sample"),
        tenant_id: "tenant_1".to_string(),
        order_number: "A-1001".to_string(),
        order_type: OrderType::Pickup,
        currency: "USD".to_string(),
        tax_rate: Rate::from_ppm(102_500),
        subtotal: Cents::from(10_000),
        tax: Cents::from(1_025),
        delivery_fee: Cents::ZERO,
        merchant_fee: Cents::ZERO,
        tip: Cents::ZERO,
        discount: Cents::ZERO,
        processor_fee: Cents::from(350),
        total: Cents::from(11_375),
        refunded_amount: Cents::ZERO,
        order_status: OrderStatusType::Pending,
        payment_status: PaymentStatusType::Pending,
        payment_intent_id: None,
        delivery_id: None,
        customer_name: None,
        customer_phone: None,
        delivery_address: None,
        version: 1,
        created_at: now,
        updated_at: now,
        completed_at: None,
        refunded_at: None,
    }
}
