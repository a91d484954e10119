use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{ItemType, OrderStatus};

/// Domain events published on state transitions. Consumers are in-process
/// today; the enum is serializable so a broker can be swapped in later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    PaymentOrderOpened {
        order_id: String,
        user_id: Uuid,
        item_type: ItemType,
    },
    PaymentOrderSettled {
        order_id: String,
        user_id: Uuid,
        status: OrderStatus,
    },
    CoinsCredited {
        order_id: String,
        user_id: Uuid,
        coins: i64,
        new_balance: i64,
    },
    SubscriptionActivated {
        order_id: String,
        user_id: Uuid,
        plan_id: String,
        expires_at: DateTime<Utc>,
    },
    PartnerPurchaseRecorded {
        order_id: String,
        user_id: Uuid,
        partner_id: Option<String>,
    },
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Best-effort publish; a full or closed channel is logged, never
    /// propagated, so event delivery can't fail a payment.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.tx.send(event).await {
            error!("failed to publish event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime of
/// the process.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!(event = %json, "domain event"),
            Err(e) => error!("failed to encode event: {}", e),
        }
    }
    info!("event channel closed, consumer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::PaymentOrderOpened {
                order_id: "coins_abc".into(),
                user_id: Uuid::new_v4(),
                item_type: ItemType::CoinBundle,
            })
            .await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::PaymentOrderOpened { .. }));
    }

    #[tokio::test]
    async fn send_on_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender
            .send(Event::PaymentOrderSettled {
                order_id: "sub_x".into(),
                user_id: Uuid::new_v4(),
                status: OrderStatus::Paid,
            })
            .await;
    }
}
