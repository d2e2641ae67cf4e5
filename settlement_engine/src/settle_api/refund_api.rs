use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{OrderId, RefundSource},
    order_objects::{OrderChange, RefundAmount, RefundApplication, RefundCommand, RefundRequestAmount, RefundResult},
    traits::{CaptureStatus, PaymentProcessor, RefundRequest, SettlementDatabase},
    OrderFlowApi,
    OrderFlowError,
};

pub const REFUND_API_ACTOR: &str = "refund_api";

/// The synchronous refund path.
///
/// The payment processor is the source of truth for money movement. Local bookkeeping only changes after the processor
/// confirms the refund, and it changes through the same guarded write that processor refund webhooks use, so a refund
/// reported through both paths is counted once.
#[derive(Clone)]
pub struct RefundApi<B, P> {
    orders: OrderFlowApi<B>,
    processor: P,
}

impl<B, P> Debug for RefundApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B, P> RefundApi<B, P> {
    pub fn new(orders: OrderFlowApi<B>, processor: P) -> Self {
        Self { orders, processor }
    }
}

impl<B, P> RefundApi<B, P>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
{
    pub async fn refund(&self, order_id: &OrderId, command: RefundCommand) -> Result<RefundResult, OrderFlowError> {
        let order = self.orders.fetch_order(order_id).await?;
        if !order.payment_status.is_refundable() {
            return Err(OrderFlowError::InvalidTransition {
                current: order.payment_status.to_string(),
                requested: "refunded".to_string(),
            });
        }
        let max = order.max_refundable();
        let amount = match command.amount {
            RefundRequestAmount::Full if max.value() <= 0 => {
                return Err(OrderFlowError::NothingToRefund(order_id.clone()));
            },
            RefundRequestAmount::Full => max,
            RefundRequestAmount::Partial(amount) if amount.value() <= 0 => {
                return Err(OrderFlowError::Validation(format!("A refund must be positive, not {amount}")));
            },
            RefundRequestAmount::Partial(amount) if amount > max => {
                return Err(OrderFlowError::RefundExceedsBalance { requested: amount, max });
            },
            RefundRequestAmount::Partial(amount) => amount,
        };
        let payment_intent_id = order.payment_intent_id.clone().ok_or_else(|| {
            OrderFlowError::Validation(format!("Order {order_id} has no payment to refund against"))
        })?;
        let request = RefundRequest {
            order_id: order_id.clone(),
            payment_intent_id,
            amount,
            idempotency_key: format!("{order_id}:{}:{}", order.refunded_amount.value(), amount.value()),
            reason: command.reason.clone(),
        };
        debug!("💸️ Requesting a refund of {amount} for order {order_id} from the payment processor");
        let refund = self.processor.create_refund(request).await.map_err(|e| {
            warn!("💸️ The payment processor did not refund order {order_id}. {e}");
            OrderFlowError::from(e)
        })?;
        info!("💸️ Processor refund {} of {} issued for order {order_id}", refund.refund_id, refund.amount);
        let application =
            RefundApplication::new(Some(refund.refund_id.clone()), RefundAmount::Incremental(amount), RefundSource::Api)
                .with_reason(command.reason);
        let change = self.orders.apply_refund(order_id, application, REFUND_API_ACTOR).await.map_err(|e| {
            error!(
                "💸️ Refund {} was issued by the processor but could not be recorded against order {order_id}. {e}. \
                 The processor's refund webhook will reconcile it.",
                refund.refund_id
            );
            e
        })?;
        if let OrderChange::Unchanged { reason, .. } = &change {
            debug!("💸️ Refund {} was already recorded. {reason}", refund.refund_id);
        }
        let order = change.into_order();
        Ok(RefundResult {
            order_id: order.id,
            refund_id: refund.refund_id,
            amount,
            refunded_amount: order.refunded_amount,
            payment_status: order.payment_status,
        })
    }

    /// Looks up the capture status of the order's payment at the processor.
    pub async fn payment_status(&self, order_id: &OrderId) -> Result<CaptureStatus, OrderFlowError> {
        let order = self.orders.fetch_order(order_id).await?;
        let payment_intent_id = order
            .payment_intent_id
            .ok_or_else(|| OrderFlowError::Validation(format!("Order {order_id} has no payment intent")))?;
        Ok(self.processor.fetch_payment_status(&payment_intent_id).await?)
    }
}
