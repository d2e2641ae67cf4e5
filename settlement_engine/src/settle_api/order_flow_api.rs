use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use rand::Rng;
use settle_common::{Cents, Rate, DEFAULT_CURRENCY_CODE};

use crate::{
    db_types::{
        AuditLogEntry,
        NewOrder,
        NewRefund,
        NewTenant,
        Order,
        OrderId,
        OrderStatusType,
        PaymentStatusType,
        RefundRecord,
        RefundSource,
        Tenant,
    },
    events::{EventProducers, OrderPaidEvent, OrderRefundedEvent},
    fees::{FeeCalculator, FeeConfig, FeeError, FeeInput},
    order_objects::{CreateOrderRequest, OrderChange, RefundAmount, RefundApplication},
    state_machine::StatusChange,
    traits::{OrderStoreError, SettlementDatabase, VersionedUpdate},
    OrderFlowError,
};

/// How many times a versioned write is re-read and re-validated before giving up with `ConcurrentModification`.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// What a write plan decided to do with the order it was shown.
#[derive(Debug, Clone)]
pub(crate) enum WritePlan {
    Write { order: Order, refund: Option<NewRefund> },
    Skip(String),
}

impl WritePlan {
    fn write(order: Order) -> Self {
        Self::Write { order, refund: None }
    }

    fn skip<S: Into<String>>(reason: S) -> Self {
        Self::Skip(reason.into())
    }
}

/// `OrderFlowApi` is the single entry point for every order mutation: order placement, staff status updates,
/// discounts, payment settlement, refunds and delivery references.
///
/// Every mutation is a guarded read-modify-write. The order is read, the change is validated against the current state,
/// and the result is written only if nobody else has written the order in the meantime. If somebody has, the whole
/// cycle is repeated on the fresh state.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    fees: FeeCalculator,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, fees: FeeConfig, producers: EventProducers) -> Self {
        Self { db, fees: FeeCalculator::new(fees), producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn fee_calculator(&self) -> &FeeCalculator {
        &self.fees
    }
}

impl<B> OrderFlowApi<B>
where B: SettlementDatabase
{
    /// Prices and stores a new order as pending and unpaid.
    ///
    /// The merchant fee and tax rate default to the tenant's configuration. An unknown tenant gets the configured
    /// default merchant fee and no tax.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderFlowError> {
        let tenant = self.db.fetch_tenant(&request.tenant_id).await?;
        if tenant.is_none() {
            debug!("🔄️📦️ Tenant {} has no settlement configuration. Using the defaults.", request.tenant_id);
        }
        let tax_rate = match (request.tax_rate, &tenant) {
            (Some(percent), _) => Rate::from_percent(percent).map_err(FeeError::from)?,
            (None, Some(tenant)) => tenant.tax_rate,
            (None, None) => Rate::default(),
        };
        let mut input = FeeInput::new(request.order_type, request.subtotal, tax_rate)
            .with_delivery_fee(request.delivery_fee.unwrap_or_default())
            .with_tip(request.tip.unwrap_or_default())
            .with_discount(request.discount.unwrap_or_default());
        if let Some(tenant) = &tenant {
            input = input.with_merchant_fee(tenant.merchant_fee);
        }
        let breakdown = self.fees.compute(&input)?;
        let order = NewOrder {
            id: OrderId::random(),
            tenant_id: request.tenant_id,
            order_number: request.order_number,
            order_type: request.order_type,
            currency: request.currency.unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string()),
            tax_rate,
            breakdown,
            payment_intent_id: request.payment_intent_id,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            delivery_address: request.delivery_address,
            created_at: Utc::now(),
        };
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} [{}] created. Total {}", order.id, order.order_number, order.total);
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn fetch_refunds(&self, order_id: &OrderId) -> Result<Vec<RefundRecord>, OrderFlowError> {
        Ok(self.db.fetch_refunds_for_order(order_id).await?)
    }

    pub async fn fetch_audit_log(&self, order_id: &OrderId) -> Result<Vec<AuditLogEntry>, OrderFlowError> {
        Ok(self.db.fetch_audit_log(order_id).await?)
    }

    pub async fn fetch_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, OrderFlowError> {
        Ok(self.db.fetch_tenant(tenant_id).await?)
    }

    pub async fn upsert_tenant(&self, tenant: NewTenant) -> Result<Tenant, OrderFlowError> {
        let tenant = self.db.upsert_tenant(tenant).await?;
        info!("🔄️ Settlement configuration for tenant {} saved", tenant.tenant_id);
        Ok(tenant)
    }

    /// Applies a status change to one or both status fields in a single atomic write.
    ///
    /// Fails with `InvalidTransition` if the transition table forbids the change, in which case nothing is written.
    pub async fn transition(
        &self,
        order_id: &OrderId,
        change: StatusChange,
        actor: &str,
    ) -> Result<Order, OrderFlowError> {
        let result = self
            .write_with_retry(order_id, actor, |order| {
                change.validate_for(order)?;
                let mut updated = order.clone();
                change.apply_to(&mut updated, Utc::now());
                Ok(WritePlan::write(updated))
            })
            .await?;
        Ok(result.into_order())
    }

    /// The staff-facing status update. Only the order status can be changed this way.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        actor: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self.transition(order_id, StatusChange::order(status), actor).await?;
        info!("🔄️ Order {order_id} moved to {status} by {actor}");
        Ok(order)
    }

    /// Moves the order status towards `target` if the transition table allows it. Unlike [`Self::transition`], a
    /// target that is current or unreachable is reported as unchanged rather than as an error.
    pub async fn advance_order_status(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
        actor: &str,
    ) -> Result<OrderChange, OrderFlowError> {
        self.write_with_retry(order_id, actor, |order| {
            if order.order_status == target {
                return Ok(WritePlan::skip(format!("Order is already {target}")));
            }
            if !order.order_status.can_transition_to(target) {
                return Ok(WritePlan::skip(format!("Order cannot move from {} to {target}", order.order_status)));
            }
            let mut updated = order.clone();
            StatusChange::order(target).apply_to(&mut updated, Utc::now());
            Ok(WritePlan::write(updated))
        })
        .await
    }

    /// Records a successful payment. A pending order is confirmed in the same write. Emits [`OrderPaidEvent`].
    ///
    /// If the payment status is no longer pending, nothing changes.
    pub async fn mark_paid(
        &self,
        order_id: &OrderId,
        payment_intent_id: &str,
        actor: &str,
    ) -> Result<OrderChange, OrderFlowError> {
        let result = self
            .write_with_retry(order_id, actor, |order| {
                if order.payment_status != PaymentStatusType::Pending {
                    return Ok(WritePlan::skip(format!("Payment is already {}", order.payment_status)));
                }
                let mut change = StatusChange::payment(PaymentStatusType::Paid);
                if order.order_status == OrderStatusType::Pending {
                    change = change.and_order(OrderStatusType::Confirmed);
                }
                change.validate_for(order)?;
                let mut updated = order.clone();
                change.apply_to(&mut updated, Utc::now());
                if updated.payment_intent_id.is_none() {
                    updated.payment_intent_id = Some(payment_intent_id.to_string());
                }
                Ok(WritePlan::write(updated))
            })
            .await?;
        if let OrderChange::Written { after, .. } = &result {
            info!("🔄️💰️ Order {} is paid", after.id);
            self.producers.publish_order_paid(OrderPaidEvent::new(after.clone())).await;
        }
        Ok(result)
    }

    pub async fn mark_payment_failed(&self, order_id: &OrderId, actor: &str) -> Result<OrderChange, OrderFlowError> {
        let result = self
            .write_with_retry(order_id, actor, |order| {
                if order.payment_status != PaymentStatusType::Pending {
                    return Ok(WritePlan::skip(format!("Payment is already {}", order.payment_status)));
                }
                let mut updated = order.clone();
                StatusChange::payment(PaymentStatusType::Failed).apply_to(&mut updated, Utc::now());
                Ok(WritePlan::write(updated))
            })
            .await?;
        if result.is_written() {
            info!("🔄️💰️ Payment for order {order_id} failed");
        }
        Ok(result)
    }

    /// Applies an additional stored-value discount and recomputes the fees. Only possible before payment.
    pub async fn apply_discount(
        &self,
        order_id: &OrderId,
        amount: Cents,
        actor: &str,
    ) -> Result<Order, OrderFlowError> {
        if amount.value() <= 0 {
            return Err(OrderFlowError::Validation(format!("A discount must be positive, not {amount}")));
        }
        let result = self
            .write_with_retry(order_id, actor, |order| {
                if order.payment_status != PaymentStatusType::Pending {
                    return Err(OrderFlowError::DiscountNotAllowed(order.payment_status));
                }
                let breakdown = self.fees.apply_discount(&order.breakdown(), amount)?;
                let mut updated = order.clone();
                updated.set_breakdown(&breakdown);
                Ok(WritePlan::write(updated))
            })
            .await?;
        let order = result.into_order();
        info!("🔄️🧾️ Discount of {amount} applied to order {order_id}. New total {}", order.total);
        Ok(order)
    }

    /// Applies a refund to the order's bookkeeping. This is the one place where `refunded_amount` changes, whether the
    /// refund came from the refund endpoint or from a processor webhook.
    ///
    /// * A refund id that has been recorded before is skipped.
    /// * Incremental amounts above the refundable balance are rejected for API refunds, and capped for webhook refunds,
    ///   since the processor has already moved the money.
    /// * Cumulative amounts never lower the refunded amount and never exceed the total.
    ///
    /// Emits [`OrderRefundedEvent`] when something was written.
    pub async fn apply_refund(
        &self,
        order_id: &OrderId,
        application: RefundApplication,
        actor: &str,
    ) -> Result<OrderChange, OrderFlowError> {
        if let Some(refund_id) = &application.refund_id {
            if self.db.refund_exists(refund_id).await? {
                let order = self.fetch_order(order_id).await?;
                debug!("💸️ Refund {refund_id} is already recorded against order {order_id}");
                return Ok(OrderChange::Unchanged { order, reason: format!("Refund {refund_id} already applied") });
            }
        }
        let result = self.write_with_retry(order_id, actor, |order| plan_refund(order, &application)).await;
        let result = match result {
            Err(OrderFlowError::DuplicateRefund(refund_id)) => {
                let order = self.fetch_order(order_id).await?;
                debug!("💸️ Refund {refund_id} was recorded concurrently against order {order_id}");
                OrderChange::Unchanged { order, reason: format!("Refund {refund_id} already applied") }
            },
            other => other?,
        };
        match &result {
            OrderChange::Written { before, after } => {
                let amount = after.refunded_amount - before.refunded_amount;
                info!(
                    "💸️ Refund of {amount} applied to order {}. Refunded {} of {} ({})",
                    after.id, after.refunded_amount, after.total, after.payment_status
                );
                let event = OrderRefundedEvent::new(after.clone(), amount, application.source);
                self.producers.publish_order_refunded(event).await;
            },
            OrderChange::Unchanged { reason, .. } => debug!("💸️ Refund for order {order_id} not applied. {reason}"),
        }
        Ok(result)
    }

    /// Stores the delivery provider's reference on the order. An order that already carries a delivery id keeps it.
    pub async fn set_delivery_reference(
        &self,
        order_id: &OrderId,
        delivery_id: &str,
        actor: &str,
    ) -> Result<OrderChange, OrderFlowError> {
        self.write_with_retry(order_id, actor, |order| {
            if let Some(existing) = &order.delivery_id {
                return Ok(WritePlan::skip(format!("Order already has delivery {existing}")));
            }
            let mut updated = order.clone();
            updated.delivery_id = Some(delivery_id.to_string());
            Ok(WritePlan::write(updated))
        })
        .await
    }

    /// Forgets a delivery the carrier cancelled, so that the order can be dispatched again. Only the delivery that is
    /// currently stored is cleared, and only while the order is still open.
    pub async fn clear_delivery_reference(
        &self,
        order_id: &OrderId,
        delivery_id: &str,
        actor: &str,
    ) -> Result<OrderChange, OrderFlowError> {
        self.write_with_retry(order_id, actor, |order| {
            if order.delivery_id.as_deref() != Some(delivery_id) {
                return Ok(WritePlan::skip(format!("Delivery {delivery_id} is not the order's current delivery")));
            }
            if order.order_status.is_terminal() {
                return Ok(WritePlan::skip(format!("Order is already {}", order.order_status)));
            }
            let mut updated = order.clone();
            updated.delivery_id = None;
            Ok(WritePlan::write(updated))
        })
        .await
    }

    /// The optimistic read-validate-write loop shared by every mutation.
    ///
    /// `plan` sees the freshly read order on every attempt, so validation always runs against the state that is being
    /// replaced.
    pub(crate) async fn write_with_retry<F>(
        &self,
        order_id: &OrderId,
        actor: &str,
        plan: F,
    ) -> Result<OrderChange, OrderFlowError>
    where
        F: Fn(&Order) -> Result<WritePlan, OrderFlowError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.fetch_order(order_id).await?;
            let (order, refund) = match plan(&current)? {
                WritePlan::Skip(reason) => return Ok(OrderChange::Unchanged { order: current, reason }),
                WritePlan::Write { order, refund } => (order, refund),
            };
            let mut update = VersionedUpdate::new(&current, order, actor);
            if let Some(refund) = refund {
                update = update.with_refund(refund);
            }
            match self.db.update_order_versioned(update).await {
                Ok(after) => return Ok(OrderChange::Written { before: current, after }),
                Err(OrderStoreError::StaleVersion(_)) => {
                    debug!("🔄️ Order {order_id} changed while we were writing it ({attempt}/{MAX_WRITE_ATTEMPTS})");
                    let jitter = rand::thread_rng().gen_range(1..=10u64) * attempt as u64;
                    tokio::time::sleep(Duration::from_millis(jitter)).await;
                },
                Err(e) => return Err(e.into()),
            }
        }
        warn!("🔄️ Gave up writing order {order_id} after {MAX_WRITE_ATTEMPTS} attempts");
        Err(OrderFlowError::ConcurrentModification(order_id.clone()))
    }
}

fn plan_refund(order: &Order, application: &RefundApplication) -> Result<WritePlan, OrderFlowError> {
    if order.payment_status == PaymentStatusType::Refunded {
        return Ok(WritePlan::skip("Order is already fully refunded"));
    }
    if !order.payment_status.is_refundable() {
        return Err(OrderFlowError::InvalidTransition {
            current: order.payment_status.to_string(),
            requested: PaymentStatusType::Refunded.to_string(),
        });
    }
    let current = order.refunded_amount;
    let new_amount = match application.amount {
        RefundAmount::Incremental(amount) => {
            if amount.value() <= 0 {
                return Err(OrderFlowError::Validation(format!("A refund must be positive, not {amount}")));
            }
            let max = order.max_refundable();
            match (amount > max, application.source) {
                (false, _) => current + amount,
                (true, RefundSource::Api) => {
                    return Err(OrderFlowError::RefundExceedsBalance { requested: amount, max });
                },
                (true, RefundSource::Webhook) => {
                    warn!("💸️ Processor refunded {amount} on order {}, but only {max} was left. Capping.", order.id);
                    order.total
                },
            }
        },
        RefundAmount::Cumulative(reported) => {
            if reported > order.total {
                warn!("💸️ Processor reports {reported} refunded on order {}, more than its total.", order.id);
            }
            reported.max(current).min(order.total)
        },
        RefundAmount::StatusOnly => current,
    };
    let status = match application.amount {
        RefundAmount::StatusOnly => PaymentStatusType::Refunded,
        _ if new_amount == order.total => PaymentStatusType::Refunded,
        _ => PaymentStatusType::PartialRefund,
    };
    if new_amount == current && status != PaymentStatusType::Refunded {
        return Ok(WritePlan::skip(format!("{current} has already been refunded")));
    }
    StatusChange::payment(status).validate_for(order)?;
    let mut updated = order.clone();
    updated.refunded_amount = new_amount;
    updated.payment_status = status;
    updated.refunded_at = Some(Utc::now());
    let refund = NewRefund {
        refund_id: application.refund_id.clone().unwrap_or_else(|| format!("rf_{}", uuid::Uuid::new_v4().simple())),
        order_id: order.id.clone(),
        amount: new_amount - current,
        source: application.source,
        reason: application.reason.clone(),
    };
    Ok(WritePlan::Write { order: updated, refund: Some(refund) })
}
