use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of purchasable item an order can be opened for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemType {
    CoinBundle,
    SubscriptionPlan,
    PartnerProduct,
}

impl ItemType {
    /// Prefix embedded in generated order ids so support staff can tell
    /// order kinds apart at a glance.
    pub fn order_prefix(self) -> &'static str {
        match self {
            ItemType::CoinBundle => "coins",
            ItemType::SubscriptionPlan => "sub",
            ItemType::PartnerProduct => "partner",
        }
    }
}

/// Snapshot of a catalog item taken at order-open time.
///
/// The snapshot is embedded in the order record so later catalog edits can
/// never change what was promised to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchasableItem {
    CoinBundle {
        id: String,
        name: String,
        price: Decimal,
        coins: i64,
    },
    SubscriptionPlan {
        id: String,
        plan_name: String,
        term_days: i32,
        price: Decimal,
    },
    PartnerProduct {
        id: String,
        title: String,
        price: Decimal,
        partner_id: Option<String>,
    },
}

impl PurchasableItem {
    pub fn item_type(&self) -> ItemType {
        match self {
            PurchasableItem::CoinBundle { .. } => ItemType::CoinBundle,
            PurchasableItem::SubscriptionPlan { .. } => ItemType::SubscriptionPlan,
            PurchasableItem::PartnerProduct { .. } => ItemType::PartnerProduct,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PurchasableItem::CoinBundle { id, .. }
            | PurchasableItem::SubscriptionPlan { id, .. }
            | PurchasableItem::PartnerProduct { id, .. } => id,
        }
    }

    pub fn price(&self) -> Decimal {
        match self {
            PurchasableItem::CoinBundle { price, .. }
            | PurchasableItem::SubscriptionPlan { price, .. }
            | PurchasableItem::PartnerProduct { price, .. } => *price,
        }
    }
}
