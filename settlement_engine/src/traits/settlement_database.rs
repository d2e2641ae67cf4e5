use crate::traits::{IdempotencyLedger, OrderManagement, TenantManagement};

/// This trait defines the highest level of behaviour for storage backends supporting the settlement engine.
///
/// A backend must offer an atomic, versioned read-modify-write on single orders and a unique-constraint insert for
/// ledger claims and refunds. Everything else is built on top of those two primitives.
pub trait SettlementDatabase: Clone + OrderManagement + IdempotencyLedger + TenantManagement {
    /// The URL of the database
    fn url(&self) -> &str;
}
