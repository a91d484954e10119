use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QuerySelect, Set, TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::{
    entities::payment_order,
    errors::ServiceError,
    models::{ItemType, OrderStatus, PaymentOrder},
};

/// Async read-modify-write step executed under the store's per-order lock.
pub type OrderMutator =
    Box<dyn FnOnce(PaymentOrder) -> BoxFuture<'static, Result<PaymentOrder, ServiceError>> + Send>;

/// Durable keyed storage for payment orders.
///
/// `update_atomic` serializes reads-then-writes per `order_id`
/// (single-writer-per-key). The fulfillment flag check-and-set happens
/// inside this boundary, which is what makes double delivery safe.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order; fails with `OrderConflict` if the id exists.
    async fn create(&self, order: PaymentOrder) -> Result<(), ServiceError>;

    async fn get(&self, order_id: &str) -> Result<Option<PaymentOrder>, ServiceError>;

    /// Runs `mutator` on the current record and persists its result, with
    /// no interleaving between concurrent calls for the same id.
    async fn update_atomic(
        &self,
        order_id: &str,
        mutator: OrderMutator,
    ) -> Result<PaymentOrder, ServiceError>;
}

fn model_to_domain(model: payment_order::Model) -> Result<PaymentOrder, ServiceError> {
    Ok(PaymentOrder {
        order_id: model.order_id,
        user_id: model.user_id,
        item_type: ItemType::from_str(&model.item_type).map_err(|_| {
            ServiceError::InternalError(format!("unknown item type '{}'", model.item_type))
        })?,
        item_id: model.item_id,
        partner_id: model.partner_id,
        amount: model.amount,
        currency: model.currency,
        item_snapshot: serde_json::from_value(model.item_snapshot)
            .map_err(|e| ServiceError::InternalError(format!("corrupt item snapshot: {}", e)))?,
        status: OrderStatus::from_str(&model.status).map_err(|_| {
            ServiceError::InternalError(format!("unknown order status '{}'", model.status))
        })?,
        gateway_order_ref: model.gateway_order_ref,
        gateway_session_ref: model.gateway_session_ref,
        fulfillment: serde_json::from_value(model.fulfillment)
            .map_err(|e| ServiceError::InternalError(format!("corrupt fulfillment state: {}", e)))?,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn domain_to_active_model(
    order: &PaymentOrder,
) -> Result<payment_order::ActiveModel, ServiceError> {
    Ok(payment_order::ActiveModel {
        order_id: Set(order.order_id.clone()),
        user_id: Set(order.user_id),
        item_type: Set(order.item_type.to_string()),
        item_id: Set(order.item_id.clone()),
        partner_id: Set(order.partner_id.clone()),
        amount: Set(order.amount),
        currency: Set(order.currency.clone()),
        item_snapshot: Set(serde_json::to_value(&order.item_snapshot)
            .map_err(|e| ServiceError::InternalError(format!("snapshot encode: {}", e)))?),
        status: Set(order.status.to_string()),
        gateway_order_ref: Set(order.gateway_order_ref.clone()),
        gateway_session_ref: Set(order.gateway_session_ref.clone()),
        fulfillment: Set(serde_json::to_value(&order.fulfillment)
            .map_err(|e| ServiceError::InternalError(format!("fulfillment encode: {}", e)))?),
        created_at: Set(order.created_at),
        updated_at: Set(order.updated_at),
    })
}

/// Order store backed by the `payment_orders` table. Atomicity comes from a
/// transaction holding an exclusive row lock for the duration of the
/// mutator.
#[derive(Clone)]
pub struct SeaOrmOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create(&self, order: PaymentOrder) -> Result<(), ServiceError> {
        let existing = payment_order::Entity::find_by_id(&order.order_id)
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::OrderConflict(order.order_id));
        }

        let model = domain_to_active_model(&order)?;
        // The primary key constraint backs up the pre-check under races.
        model.insert(&*self.db).await.map_err(|e| {
            if e.to_string().to_lowercase().contains("unique") {
                ServiceError::OrderConflict(order.order_id.clone())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<PaymentOrder>, ServiceError> {
        let model = payment_order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?;
        model.map(model_to_domain).transpose()
    }

    #[instrument(skip(self, mutator))]
    async fn update_atomic(
        &self,
        order_id: &str,
        mutator: OrderMutator,
    ) -> Result<PaymentOrder, ServiceError> {
        let order_id = order_id.to_string();
        let updated = self
            .db
            .transaction::<_, PaymentOrder, ServiceError>(move |txn| {
                Box::pin(async move {
                    let model = payment_order::Entity::find_by_id(&order_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or(ServiceError::OrderNotFound(order_id))?;

                    let current = model_to_domain(model)?;
                    let next = mutator(current).await?;

                    let active = domain_to_active_model(&next)?;
                    active.update(txn).await?;
                    Ok(next)
                })
            })
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(e) => ServiceError::DatabaseError(e),
                sea_orm::TransactionError::Transaction(e) => e,
            })?;

        Ok(updated)
    }
}

/// In-memory order store with per-key mutex serialization. Used by tests
/// and as the reference model for the store contract.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<String, PaymentOrder>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, order_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: PaymentOrder) -> Result<(), ServiceError> {
        match self.orders.entry(order.order_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ServiceError::OrderConflict(order.order_id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, order_id: &str) -> Result<Option<PaymentOrder>, ServiceError> {
        Ok(self.orders.get(order_id).map(|entry| entry.clone()))
    }

    async fn update_atomic(
        &self,
        order_id: &str,
        mutator: OrderMutator,
    ) -> Result<PaymentOrder, ServiceError> {
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let current = self
            .orders
            .get(order_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ServiceError::OrderNotFound(order_id.to_string()))?;

        let next = mutator(current).await?;
        self.orders.insert(order_id.to_string(), next.clone());
        Ok(next)
    }
}
