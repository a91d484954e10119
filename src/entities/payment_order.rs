use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record of a payment order. The audit trail of the whole
/// lifecycle; rows are never deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    pub user_id: Uuid,
    pub item_type: String,
    pub item_id: String,
    pub partner_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub item_snapshot: Json,
    pub status: String,
    pub gateway_order_ref: String,
    pub gateway_session_ref: String,
    pub fulfillment: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
