//! Settlement Engine
//!
//! The settlement engine prices marketplace orders, tracks them through their order and payment lifecycles, and
//! reconciles the asynchronous notifications (webhooks) sent by the payment processor and the delivery provider.
//! It is provider-agnostic and transport-agnostic: HTTP servers and concrete provider clients live elsewhere.
//!
//! The library is divided into these main sections:
//! 1. Pricing ([`mod@fees`]). A pure fee calculator that turns order inputs into a [`fees::FeeBreakdown`].
//! 2. Database management and control ([`mod@traits`] and the SQLite backend). You should never need to access the
//!    database directly. Instead, use the public API provided by the engine. The data types stored in the database
//!    are public and live in [`mod@db_types`].
//! 3. The public API ([`OrderFlowApi`], [`WebhookApi`], [`RefundApi`], [`DispatchApi`]). Every order mutation flows
//!    through the same versioned, transition-checked write, whether it was triggered by staff, by a refund request
//!    or by a provider webhook.
//!
//! Webhooks are processed exactly once per `(provider, event_id)` through the idempotency ledger, see
//! [`WebhookProcessor`].
//!
//! The engine also emits events when orders are paid or refunded. A simple actor framework ([`mod@events`]) lets you
//! hook into these and perform custom actions, such as sending notifications.
mod db;

pub mod db_types;
pub mod events;
pub mod fees;
pub mod helpers;
mod settle_api;
pub mod state_machine;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use settle_api::{
    config::{EngineConfig, LedgerConfig, WebhookSecurityConfig},
    dispatch_api::DispatchApi,
    errors::{OrderFlowError, WebhookError},
    order_flow_api::OrderFlowApi,
    order_objects,
    refund_api::RefundApi,
    settlement_handlers::{DeliveryHandler, PaymentHandler, SettlementOutcome},
    webhook_api::{WebhookAck, WebhookApi},
    webhook_events,
    webhook_processor::{ProcessOnceResult, WebhookProcessor},
};
