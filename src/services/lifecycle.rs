use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{FulfillmentState, ItemType, OrderStatus, PaymentOrder},
    services::{
        catalog::CatalogResolver,
        fulfillment::FulfillmentDispatcher,
        gateway::{CreateRemoteOrderRequest, GatewayCustomer, PaymentGateway},
        order_store::OrderStore,
    },
};

/// Which delivery channel triggered a reconciliation. Both channels run the
/// same code path; the label only feeds logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReconcileSource {
    Webhook,
    ClientVerify,
}

#[derive(Debug, Clone)]
pub struct OpenOrderInput {
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: String,
    pub partner_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

/// Drives the order state machine.
///
/// All writes to an order funnel through `OrderStore::update_atomic`, so
/// webhook deliveries and client verifies racing on the same order are
/// applied one at a time. The truth about payment outcome always comes
/// from a server-to-server status fetch, never from an inbound payload.
pub struct OrderLifecycleService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<dyn CatalogResolver>,
    fulfillment: Arc<FulfillmentDispatcher>,
    events: EventSender,
    currency: String,
    return_url: String,
}

impl OrderLifecycleService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<dyn CatalogResolver>,
        fulfillment: Arc<FulfillmentDispatcher>,
        events: EventSender,
        currency: String,
        return_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
            fulfillment,
            events,
            currency,
            return_url,
        }
    }

    /// Opens a new order: snapshots the catalog item, registers the order
    /// with the gateway and persists it in `CREATED`.
    ///
    /// An order id collision is retried once with a fresh id and a fresh
    /// gateway registration; the abandoned gateway order simply expires.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, item_type = %input.item_type, item_id = %input.item_id))]
    pub async fn open(&self, input: OpenOrderInput) -> Result<PaymentOrder, ServiceError> {
        let item = self
            .catalog
            .resolve(input.item_type, &input.item_id, input.partner_id.as_deref())
            .await?;
        let amount = item.price();

        for attempt in 0..=1 {
            let order_id = generate_order_id(input.item_type);

            let refs = self
                .gateway
                .create_remote_order(CreateRemoteOrderRequest {
                    order_id: order_id.clone(),
                    amount,
                    currency: self.currency.clone(),
                    customer: GatewayCustomer {
                        customer_id: input.user_id,
                        customer_email: input.customer_email.clone(),
                        customer_phone: input.customer_phone.clone(),
                    },
                    return_url: self.return_url.clone(),
                })
                .await?;

            let now = Utc::now();
            let order = PaymentOrder {
                order_id: order_id.clone(),
                user_id: input.user_id,
                item_type: input.item_type,
                item_id: input.item_id.clone(),
                partner_id: input.partner_id.clone(),
                amount,
                currency: self.currency.clone(),
                item_snapshot: item.clone(),
                status: OrderStatus::Created,
                gateway_order_ref: refs.gateway_order_ref,
                gateway_session_ref: refs.gateway_session_ref,
                fulfillment: FulfillmentState::default(),
                created_at: now,
                updated_at: now,
            };

            match self.store.create(order.clone()).await {
                Ok(()) => {
                    info!(order_id = %order.order_id, amount = %amount, "payment order opened");
                    self.events
                        .send(Event::PaymentOrderOpened {
                            order_id: order.order_id.clone(),
                            user_id: order.user_id,
                            item_type: order.item_type,
                        })
                        .await;
                    return Ok(order);
                }
                Err(ServiceError::OrderConflict(_)) if attempt == 0 => {
                    warn!(order_id = %order_id, "order id collision, retrying with a fresh id");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::InternalError(
            "could not allocate a unique order id".to_string(),
        ))
    }

    /// Confirms the payment outcome against the gateway and applies any
    /// owed fulfillment, atomically per order.
    ///
    /// Safe to call any number of times from any channel: a settled and
    /// fulfilled order returns immediately without taking the per-order
    /// lock, and a terminal order never consults the gateway again. The
    /// gateway round trip happens before the atomic section so the lock
    /// is never held across network I/O; terminality is re-checked under
    /// the lock before anything is applied.
    #[instrument(skip(self), fields(order_id = %order_id, source = %source))]
    pub async fn reconcile(
        &self,
        order_id: &str,
        source: ReconcileSource,
    ) -> Result<PaymentOrder, ServiceError> {
        let current = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;

        if current.status.is_terminal() && !current.needs_fulfillment() {
            return Ok(current);
        }

        // A gateway error propagates here, before any write, so stored
        // state is untouched and the caller may retry. Terminal orders
        // skip the fetch; they only owe fulfillment repair.
        let fetched = if current.status.is_terminal() {
            None
        } else {
            let raw = self
                .gateway
                .fetch_remote_order_status(&current.gateway_order_ref)
                .await?;
            Some(raw.normalize())
        };

        let dispatcher = self.fulfillment.clone();
        let events = self.events.clone();

        self.store
            .update_atomic(
                order_id,
                Box::new(move |mut order| {
                    Box::pin(async move {
                        // A racing delivery may have settled the order
                        // between the read above and taking the lock.
                        if order.status.is_terminal() {
                            if order.needs_fulfillment() {
                                order = dispatcher.apply(order).await;
                                order.updated_at = Utc::now();
                            }
                            return Ok(order);
                        }

                        let Some(next) = fetched else {
                            return Ok(order);
                        };

                        if order.status != next {
                            info!(
                                order_id = %order.order_id,
                                from = %order.status,
                                to = %next,
                                source = %source,
                                "order status transition"
                            );
                        }
                        order.status = next;

                        if next == OrderStatus::Paid {
                            order = dispatcher.apply(order).await;
                        }
                        if next.is_terminal() {
                            events
                                .send(Event::PaymentOrderSettled {
                                    order_id: order.order_id.clone(),
                                    user_id: order.user_id,
                                    status: next,
                                })
                                .await;
                        }

                        order.updated_at = Utc::now();
                        Ok(order)
                    })
                }),
            )
            .await
    }

    /// Client-driven verification. Ownership is checked before the gateway
    /// round trip so one user cannot query another user's orders.
    pub async fn verify_for_user(
        &self,
        user_id: Uuid,
        order_id: &str,
    ) -> Result<PaymentOrder, ServiceError> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        if !order.is_owned_by(user_id) {
            return Err(ServiceError::OrderForbidden);
        }

        self.reconcile(order_id, ReconcileSource::ClientVerify).await
    }

    /// Read-back without reconciliation.
    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        order_id: &str,
    ) -> Result<PaymentOrder, ServiceError> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;
        if !order.is_owned_by(user_id) {
            return Err(ServiceError::OrderForbidden);
        }
        Ok(order)
    }
}

fn generate_order_id(item_type: ItemType) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("{}_{}", item_type.order_prefix(), suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_carry_the_item_prefix() {
        let id = generate_order_id(ItemType::CoinBundle);
        assert!(id.starts_with("coins_"));
        assert_eq!(id.len(), "coins_".len() + 16);

        let id = generate_order_id(ItemType::SubscriptionPlan);
        assert!(id.starts_with("sub_"));

        let id = generate_order_id(ItemType::PartnerProduct);
        assert!(id.starts_with("partner_"));
    }

    #[test]
    fn order_ids_are_effectively_unique() {
        let a = generate_order_id(ItemType::CoinBundle);
        let b = generate_order_id(ItemType::CoinBundle);
        assert_ne!(a, b);
    }
}
