use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId, OrderType, PaymentStatusType},
    order_objects::OrderChange,
    traits::{DeliveryProvider, DeliveryQuote, DeliveryRequest, SettlementDatabase},
    OrderFlowApi,
    OrderFlowError,
};

pub const DISPATCH_ACTOR: &str = "dispatch_api";

/// Hands paid delivery orders over to the delivery provider.
#[derive(Clone)]
pub struct DispatchApi<B, D> {
    orders: OrderFlowApi<B>,
    provider: D,
}

impl<B, D> Debug for DispatchApi<B, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchApi")
    }
}

impl<B, D> DispatchApi<B, D> {
    pub fn new(orders: OrderFlowApi<B>, provider: D) -> Self {
        Self { orders, provider }
    }
}

impl<B, D> DispatchApi<B, D>
where
    B: SettlementDatabase,
    D: DeliveryProvider,
{
    pub async fn quote(&self, order_id: &OrderId) -> Result<DeliveryQuote, OrderFlowError> {
        let order = self.orders.fetch_order(order_id).await?;
        check_dispatchable(&order)?;
        let request = self.delivery_request(&order).await?;
        let quote = self.provider.quote(&request).await?;
        debug!("🚚️ Delivery quote {} for order {order_id}: {}", quote.quote_id, quote.fee);
        Ok(quote)
    }

    /// Creates the delivery and stores its id on the order. An order that has already been dispatched is returned
    /// as it is, without contacting the provider.
    pub async fn dispatch(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.orders.fetch_order(order_id).await?;
        if let Some(delivery_id) = &order.delivery_id {
            debug!("🚚️ Order {order_id} was already dispatched as delivery {delivery_id}");
            return Ok(order);
        }
        check_dispatchable(&order)?;
        let request = self.delivery_request(&order).await?;
        let quote = self.provider.quote(&request).await?;
        let delivery = self.provider.accept(&quote, &request).await.map_err(|e| {
            warn!("🚚️ The delivery provider rejected quote {} for order {order_id}. {e}", quote.quote_id);
            OrderFlowError::from(e)
        })?;
        info!("🚚️ Order {order_id} dispatched as delivery {} ({})", delivery.delivery_id, delivery.status);
        let change = self.orders.set_delivery_reference(order_id, &delivery.delivery_id, DISPATCH_ACTOR).await?;
        if let OrderChange::Unchanged { reason, .. } = &change {
            warn!("🚚️ Delivery {} was not stored on order {order_id}. {reason}", delivery.delivery_id);
        }
        Ok(change.into_order())
    }

    async fn delivery_request(&self, order: &Order) -> Result<DeliveryRequest, OrderFlowError> {
        let tenant = self.orders.fetch_tenant(&order.tenant_id).await?.ok_or_else(|| {
            OrderFlowError::Validation(format!("Tenant {} has no pickup details configured", order.tenant_id))
        })?;
        let missing = |field: &str| OrderFlowError::Validation(format!("Cannot dispatch {}: {field} is missing", order.id));
        Ok(DeliveryRequest {
            order_id: order.id.clone(),
            external_id: order.id.as_str().to_string(),
            order_number: order.order_number.clone(),
            pickup_name: tenant.name,
            pickup_address: tenant.pickup_address.ok_or_else(|| missing("pickup address"))?,
            pickup_phone: tenant.pickup_phone.ok_or_else(|| missing("pickup phone"))?,
            dropoff_name: order.customer_name.clone().ok_or_else(|| missing("customer name"))?,
            dropoff_address: order.delivery_address.clone().ok_or_else(|| missing("delivery address"))?,
            dropoff_phone: order.customer_phone.clone().ok_or_else(|| missing("customer phone"))?,
            manifest_total: order.subtotal,
            tip: order.tip,
        })
    }
}

fn check_dispatchable(order: &Order) -> Result<(), OrderFlowError> {
    if order.order_type != OrderType::Delivery {
        return Err(OrderFlowError::Validation(format!("Order {} is a {} order", order.id, order.order_type)));
    }
    if order.payment_status != PaymentStatusType::Paid {
        return Err(OrderFlowError::InvalidTransition {
            current: order.payment_status.to_string(),
            requested: "dispatched".to_string(),
        });
    }
    if order.order_status.is_terminal() {
        return Err(OrderFlowError::InvalidTransition {
            current: order.order_status.to_string(),
            requested: "dispatched".to_string(),
        });
    }
    Ok(())
}
