#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use coursepay_api::errors::ServiceError;
use coursepay_api::events::{Event, EventSender};
use coursepay_api::models::{ItemType, PurchasableItem, RawGatewayStatus};
use coursepay_api::services::catalog::CatalogResolver;
use coursepay_api::services::fulfillment::FulfillmentDispatcher;
use coursepay_api::services::gateway::{
    CreateRemoteOrderRequest, PaymentGateway, RemoteOrderRefs,
};
use coursepay_api::services::lifecycle::OrderLifecycleService;
use coursepay_api::services::order_store::InMemoryOrderStore;
use coursepay_api::services::subscriptions::{SubscriptionActivator, SubscriptionReceipt};
use coursepay_api::services::wallet::{WalletCreditReceipt, WalletLedger};

/// Scripted outcome for the next gateway status fetch.
pub enum ScriptedStatus {
    Status(RawGatewayStatus),
    GatewayDown,
}

/// Gateway double with a scripted status queue and call counters.
pub struct FakeGateway {
    statuses: Mutex<VecDeque<ScriptedStatus>>,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_status(&self, status: RawGatewayStatus) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::Status(status));
    }

    pub fn push_outage(&self) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::GatewayDown);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_remote_order(
        &self,
        request: CreateRemoteOrderRequest,
    ) -> Result<RemoteOrderRefs, ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteOrderRefs {
            gateway_order_ref: format!("gw_{}", request.order_id),
            gateway_session_ref: format!("session_{}", request.order_id),
        })
    }

    async fn fetch_remote_order_status(
        &self,
        _gateway_order_ref: &str,
    ) -> Result<RawGatewayStatus, ServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(ScriptedStatus::Status(status)) => Ok(status),
            Some(ScriptedStatus::GatewayDown) => {
                Err(ServiceError::GatewayError("scripted outage".into()))
            }
            None => Err(ServiceError::GatewayError("no scripted status".into())),
        }
    }
}

/// Catalog double over an editable item list.
pub struct FakeCatalog {
    items: Mutex<Vec<PurchasableItem>>,
}

impl FakeCatalog {
    pub fn new(items: Vec<PurchasableItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    /// Replaces an item in place, simulating a catalog edit after orders
    /// were opened against the old version.
    pub fn replace(&self, item: PurchasableItem) {
        let mut items = self.items.lock().unwrap();
        items.retain(|i| !(i.item_type() == item.item_type() && i.id() == item.id()));
        items.push(item);
    }
}

#[async_trait]
impl CatalogResolver for FakeCatalog {
    async fn resolve(
        &self,
        item_type: ItemType,
        item_id: &str,
        _partner_id: Option<&str>,
    ) -> Result<PurchasableItem, ServiceError> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.item_type() == item_type && i.id() == item_id)
            .cloned()
            .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))
    }
}

/// Wallet double that dedupes on the idempotency token and counts real
/// credits.
pub struct FakeWallet {
    applied: DashMap<String, WalletCreditReceipt>,
    balances: DashMap<Uuid, i64>,
    pub credit_count: AtomicUsize,
    fail_next: AtomicUsize,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            applied: DashMap::new(),
            balances: DashMap::new(),
            credit_count: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_credit(&self) {
        self.fail_next.fetch_add(1, Ordering::SeqCst);
    }

    pub fn balance_of(&self, user_id: Uuid) -> i64 {
        self.balances.get(&user_id).map(|b| *b).unwrap_or(0)
    }
}

#[async_trait]
impl WalletLedger for FakeWallet {
    async fn credit_coins(
        &self,
        user_id: Uuid,
        coins: i64,
        idempotency_token: &str,
    ) -> Result<WalletCreditReceipt, ServiceError> {
        if let Some(existing) = self.applied.get(idempotency_token) {
            return Ok(existing.clone());
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ServiceError::FulfillmentError("wallet unavailable".into()));
        }

        let mut balance = self.balances.entry(user_id).or_insert(0);
        *balance += coins;
        let receipt = WalletCreditReceipt {
            coins_credited: coins,
            new_balance: *balance,
        };
        self.applied
            .insert(idempotency_token.to_string(), receipt.clone());
        self.credit_count.fetch_add(1, Ordering::SeqCst);
        Ok(receipt)
    }
}

/// Subscription double, unique per source order.
pub struct FakeSubscriptions {
    applied: DashMap<String, SubscriptionReceipt>,
    pub activation_count: AtomicUsize,
}

impl FakeSubscriptions {
    pub fn new() -> Self {
        Self {
            applied: DashMap::new(),
            activation_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SubscriptionActivator for FakeSubscriptions {
    async fn activate(
        &self,
        _user_id: Uuid,
        plan_id: &str,
        plan_name: &str,
        term_days: i32,
        source_order_id: &str,
    ) -> Result<SubscriptionReceipt, ServiceError> {
        if let Some(existing) = self.applied.get(source_order_id) {
            return Ok(existing.clone());
        }
        let starts_at = Utc::now();
        let receipt = SubscriptionReceipt {
            plan_id: plan_id.to_string(),
            plan_name: plan_name.to_string(),
            starts_at,
            expires_at: starts_at + Duration::days(i64::from(term_days)),
        };
        self.applied
            .insert(source_order_id.to_string(), receipt.clone());
        self.activation_count.fetch_add(1, Ordering::SeqCst);
        Ok(receipt)
    }
}

pub struct TestHarness {
    pub lifecycle: Arc<OrderLifecycleService>,
    pub store: Arc<InMemoryOrderStore>,
    pub gateway: Arc<FakeGateway>,
    pub catalog: Arc<FakeCatalog>,
    pub wallet: Arc<FakeWallet>,
    pub subscriptions: Arc<FakeSubscriptions>,
    pub events: mpsc::Receiver<Event>,
}

pub fn default_catalog() -> Vec<PurchasableItem> {
    use rust_decimal_macros::dec;
    vec![
        PurchasableItem::CoinBundle {
            id: "cb-starter".into(),
            name: "Starter pack".into(),
            price: dec!(499),
            coins: 500,
        },
        PurchasableItem::SubscriptionPlan {
            id: "plan-monthly".into(),
            plan_name: "Monthly".into(),
            term_days: 30,
            price: dec!(299),
        },
        PurchasableItem::PartnerProduct {
            id: "pp-cert".into(),
            title: "Partner certificate".into(),
            price: dec!(1299),
            partner_id: Some("acme".into()),
        },
    ]
}

pub fn harness() -> TestHarness {
    harness_with_catalog(default_catalog())
}

pub fn harness_with_catalog(items: Vec<PurchasableItem>) -> TestHarness {
    let (tx, rx) = mpsc::channel(64);
    let events = EventSender::new(tx);

    let store = Arc::new(InMemoryOrderStore::new());
    let gateway = Arc::new(FakeGateway::new());
    let catalog = Arc::new(FakeCatalog::new(items));
    let wallet = Arc::new(FakeWallet::new());
    let subscriptions = Arc::new(FakeSubscriptions::new());

    let fulfillment = Arc::new(FulfillmentDispatcher::new(
        wallet.clone(),
        subscriptions.clone(),
        events.clone(),
    ));
    let lifecycle = Arc::new(OrderLifecycleService::new(
        store.clone(),
        gateway.clone(),
        catalog.clone(),
        fulfillment,
        events,
        "INR".to_string(),
        "https://app.example.com/payments/return".to_string(),
    ));

    TestHarness {
        lifecycle,
        store,
        gateway,
        catalog,
        wallet,
        subscriptions,
        events: rx,
    }
}
