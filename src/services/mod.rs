pub mod catalog;
pub mod fulfillment;
pub mod gateway;
pub mod lifecycle;
pub mod order_store;
pub mod subscriptions;
pub mod wallet;
