use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{entities::user_subscription, errors::ServiceError};

/// Result of activating a subscription plan for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReceipt {
    pub plan_id: String,
    pub plan_name: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Subscription collaborator. Activation is unique per source order, so a
/// replayed activation returns the original receipt.
#[async_trait]
pub trait SubscriptionActivator: Send + Sync {
    async fn activate(
        &self,
        user_id: Uuid,
        plan_id: &str,
        plan_name: &str,
        term_days: i32,
        source_order_id: &str,
    ) -> Result<SubscriptionReceipt, ServiceError>;
}

#[derive(Clone)]
pub struct SeaOrmSubscriptionActivator {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSubscriptionActivator {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionActivator for SeaOrmSubscriptionActivator {
    #[instrument(skip(self), fields(user_id = %user_id, plan_id = %plan_id))]
    async fn activate(
        &self,
        user_id: Uuid,
        plan_id: &str,
        plan_name: &str,
        term_days: i32,
        source_order_id: &str,
    ) -> Result<SubscriptionReceipt, ServiceError> {
        let plan_id = plan_id.to_string();
        let plan_name = plan_name.to_string();
        let source_order_id = source_order_id.to_string();

        let receipt = self
            .db
            .transaction::<_, SubscriptionReceipt, ServiceError>(move |txn| {
                Box::pin(async move {
                    if let Some(existing) = user_subscription::Entity::find()
                        .filter(user_subscription::Column::SourceOrderId.eq(&source_order_id))
                        .one(txn)
                        .await?
                    {
                        return Ok(SubscriptionReceipt {
                            plan_id: existing.plan_id,
                            plan_name: existing.plan_name,
                            starts_at: existing.starts_at,
                            expires_at: existing.expires_at,
                        });
                    }

                    let starts_at = Utc::now();
                    let expires_at = starts_at + Duration::days(i64::from(term_days));
                    let row = user_subscription::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        user_id: Set(user_id),
                        plan_id: Set(plan_id.clone()),
                        plan_name: Set(plan_name.clone()),
                        starts_at: Set(starts_at),
                        expires_at: Set(expires_at),
                        source_order_id: Set(source_order_id),
                        created_at: Set(starts_at),
                    };
                    row.insert(txn).await?;

                    Ok(SubscriptionReceipt {
                        plan_id,
                        plan_name,
                        starts_at,
                        expires_at,
                    })
                })
            })
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(e) => ServiceError::DatabaseError(e),
                sea_orm::TransactionError::Transaction(e) => e,
            })?;

        info!(
            user_id = %user_id,
            plan_id = %receipt.plan_id,
            expires_at = %receipt.expires_at,
            "subscription activated"
        );
        Ok(receipt)
    }
}
