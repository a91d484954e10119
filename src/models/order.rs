use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::item::{ItemType, PurchasableItem};

/// Canonical, gateway-agnostic order state.
///
/// `Created → {Pending | Paid | Failed | Cancelled}`; `Paid`, `Failed` and
/// `Cancelled` are terminal. Reconciliation after a terminal state is a
/// no-op that returns the last known result.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }
}

/// Record of a coin credit applied to the user's wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinCreditRecord {
    pub coins_issued: i64,
    pub new_balance: i64,
    pub at: DateTime<Utc>,
}

/// Record of a subscription activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub plan_id: String,
    pub plan_name: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub at: DateTime<Utc>,
}

/// Audit record of a partner-product purchase confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub at: DateTime<Utc>,
}

/// Per-effect idempotency guard. A fulfillment action is attempted if and
/// only if its record is unset, and the record is persisted in the same
/// atomic order update that applied the action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<CoinCreditRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase: Option<PurchaseRecord>,
}

impl FulfillmentState {
    /// True once the single effect owed for `item_type` has been applied.
    pub fn is_complete(&self, item_type: ItemType) -> bool {
        match item_type {
            ItemType::CoinBundle => self.coins.is_some(),
            ItemType::SubscriptionPlan => self.subscription.is_some(),
            ItemType::PartnerProduct => self.purchase.is_some(),
        }
    }
}

/// A single purchase intent tying a user, an item snapshot and a gateway
/// reference together. Mutated only by the lifecycle service, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Globally unique; doubles as the idempotency key for the lifecycle.
    pub order_id: String,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: String,
    pub partner_id: Option<String>,
    /// Fixed at creation; never recomputed from the live catalog.
    pub amount: Decimal,
    pub currency: String,
    pub item_snapshot: PurchasableItem,
    pub status: OrderStatus,
    pub gateway_order_ref: String,
    pub gateway_session_ref: String,
    pub fulfillment: FulfillmentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// A PAID order still owing its entitlement.
    pub fn needs_fulfillment(&self) -> bool {
        self.status == OrderStatus::Paid && !self.fulfillment.is_complete(self.item_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Created.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn fulfillment_completeness_is_per_item_type() {
        let mut state = FulfillmentState::default();
        assert!(!state.is_complete(ItemType::CoinBundle));

        state.coins = Some(CoinCreditRecord {
            coins_issued: 500,
            new_balance: 500,
            at: Utc::now(),
        });
        assert!(state.is_complete(ItemType::CoinBundle));
        assert!(!state.is_complete(ItemType::SubscriptionPlan));
    }

    #[test]
    fn status_serializes_screaming() {
        assert_eq!(
            serde_json::to_value(OrderStatus::Paid).unwrap(),
            serde_json::json!("PAID")
        );
        assert_eq!(OrderStatus::Cancelled.to_string(), "CANCELLED");
    }
}
