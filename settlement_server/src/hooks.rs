use futures::future::BoxFuture;
use log::*;
use settlement_engine::events::{EventHandlers, EventHooks, OrderPaidEvent, OrderRefundedEvent};

pub const NOTIFICATION_BUFFER_SIZE: usize = 25;

/// The notification dispatch point. Paid and refunded orders are logged here; a mailer or push service would hang
/// off the same hooks.
pub fn create_notification_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev: OrderPaidEvent| -> BoxFuture<'static, ()> {
        let order = ev.order;
        Box::pin(async move {
            info!(
                "📬️ Order {} ({}) for tenant {} has been paid. Total {}.",
                order.order_number, order.id, order.tenant_id, order.total
            );
        })
    });
    hooks.on_order_refunded(|ev: OrderRefundedEvent| -> BoxFuture<'static, ()> {
        let kind = if ev.is_full_refund() { "fully" } else { "partially" };
        Box::pin(async move {
            info!(
                "📬️ Order {} ({}) has been {kind} refunded. {} via {}, {} refunded in total.",
                ev.order.order_number, ev.order.id, ev.amount, ev.source, ev.order.refunded_amount
            );
        })
    });
    EventHandlers::new(NOTIFICATION_BUFFER_SIZE, hooks)
}
