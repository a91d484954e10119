pub mod gateway;
pub mod item;
pub mod order;

pub use gateway::RawGatewayStatus;
pub use item::{ItemType, PurchasableItem};
pub use order::{
    CoinCreditRecord, FulfillmentState, OrderStatus, PaymentOrder, PurchaseRecord,
    SubscriptionRecord,
};
