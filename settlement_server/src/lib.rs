//! # Settlement server
//!
//! The HTTP front end of the settlement engine. It is responsible for:
//! * Receiving payment processor and delivery provider webhooks, authenticating them and handing them to the engine,
//!   which processes each event exactly once.
//! * The synchronous order endpoints: order creation, status updates, discounts, refunds and delivery dispatch.
//! * Tenant settlement configuration and the tenant-visible audit of unverified webhooks.
//! * Housekeeping: purging old idempotency ledger rows, and dispatching order notifications.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/payments` and `/webhooks/delivery`: provider webhooks.
//! * `/api/orders/...` and `/api/tenants/...`: see [routes](routes/index.html).
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod hooks;
pub mod integrations;
pub mod retention_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
