pub mod config;
pub mod dispatch_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod refund_api;
pub mod settlement_handlers;
pub mod webhook_api;
pub mod webhook_events;
pub mod webhook_processor;
