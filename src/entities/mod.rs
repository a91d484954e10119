pub mod coin_bundle;
pub mod partner_product;
pub mod payment_order;
pub mod subscription_plan;
pub mod user_subscription;
pub mod wallet_ledger_entry;
