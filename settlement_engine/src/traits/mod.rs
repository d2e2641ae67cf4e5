//! # Storage and collaborator contracts
//!
//! This module defines the interfaces that database *backends* and external collaborators need to expose in order to
//! be driven by the settlement engine.
//!
//! * [`SettlementDatabase`] is the highest level of behaviour for storage backends. It combines
//! * [`OrderManagement`], the order store with its versioned read-modify-write primitive,
//! * [`IdempotencyLedger`], the durable record of processed webhook events, and
//! * [`TenantManagement`], per-tenant settlement configuration.
//!
//! The external services the engine calls out to are described by [`PaymentProcessor`] and [`DeliveryProvider`].
//! Their failures are reported as [`ExternalServiceError`], which carries a retryable flag.
mod data_objects;
mod delivery_provider;
mod idempotency_ledger;
mod order_management;
mod payment_processor;
mod settlement_database;
mod tenant_management;

pub use data_objects::{ClaimOutcome, EventClaim, VersionedUpdate};
pub use delivery_provider::{DeliveryHandle, DeliveryProvider, DeliveryQuote, DeliveryRequest};
pub use idempotency_ledger::{IdempotencyLedger, LedgerError};
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_processor::{CaptureStatus, ExternalServiceError, PaymentProcessor, ProcessorRefund, RefundRequest};
pub use settlement_database::SettlementDatabase;
pub use tenant_management::TenantManagement;
