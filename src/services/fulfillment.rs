use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    events::{Event, EventSender},
    models::{
        CoinCreditRecord, ItemType, PaymentOrder, PurchasableItem, PurchaseRecord,
        SubscriptionRecord,
    },
    services::{subscriptions::SubscriptionActivator, wallet::WalletLedger},
};

/// Applies the entitlement a paid order owes and stamps the matching
/// fulfillment record.
///
/// Must only be called inside the order store's atomic update, so the
/// record check-and-set cannot interleave with a concurrent delivery of
/// the same payment. Each effect is guarded by its own record: a set
/// record is never re-applied, and a collaborator failure leaves the
/// record unset so the next reconciliation retries.
#[derive(Clone)]
pub struct FulfillmentDispatcher {
    wallet: Arc<dyn WalletLedger>,
    subscriptions: Arc<dyn SubscriptionActivator>,
    events: EventSender,
}

impl FulfillmentDispatcher {
    pub fn new(
        wallet: Arc<dyn WalletLedger>,
        subscriptions: Arc<dyn SubscriptionActivator>,
        events: EventSender,
    ) -> Self {
        Self {
            wallet,
            subscriptions,
            events,
        }
    }

    #[instrument(skip(self, order), fields(order_id = %order.order_id, item_type = %order.item_type))]
    pub async fn apply(&self, mut order: PaymentOrder) -> PaymentOrder {
        if order.fulfillment.is_complete(order.item_type) {
            return order;
        }

        match order.item_type {
            ItemType::CoinBundle => self.credit_coins(&mut order).await,
            ItemType::SubscriptionPlan => self.activate_subscription(&mut order).await,
            ItemType::PartnerProduct => self.record_purchase(&mut order).await,
        }

        order
    }

    async fn credit_coins(&self, order: &mut PaymentOrder) {
        let PurchasableItem::CoinBundle { coins, .. } = &order.item_snapshot else {
            warn!(order_id = %order.order_id, "coin order without a coin bundle snapshot");
            return;
        };

        match self
            .wallet
            .credit_coins(order.user_id, *coins, &order.order_id)
            .await
        {
            Ok(receipt) => {
                order.fulfillment.coins = Some(CoinCreditRecord {
                    coins_issued: receipt.coins_credited,
                    new_balance: receipt.new_balance,
                    at: Utc::now(),
                });
                info!(order_id = %order.order_id, coins = receipt.coins_credited, "coins credited");
                self.events
                    .send(Event::CoinsCredited {
                        order_id: order.order_id.clone(),
                        user_id: order.user_id,
                        coins: receipt.coins_credited,
                        new_balance: receipt.new_balance,
                    })
                    .await;
            }
            Err(e) => {
                warn!(order_id = %order.order_id, "coin credit deferred: {}", e);
            }
        }
    }

    async fn activate_subscription(&self, order: &mut PaymentOrder) {
        let PurchasableItem::SubscriptionPlan {
            id,
            plan_name,
            term_days,
            ..
        } = &order.item_snapshot
        else {
            warn!(order_id = %order.order_id, "subscription order without a plan snapshot");
            return;
        };

        match self
            .subscriptions
            .activate(order.user_id, id, plan_name, *term_days, &order.order_id)
            .await
        {
            Ok(receipt) => {
                order.fulfillment.subscription = Some(SubscriptionRecord {
                    plan_id: receipt.plan_id.clone(),
                    plan_name: receipt.plan_name,
                    starts_at: receipt.starts_at,
                    expires_at: receipt.expires_at,
                    at: Utc::now(),
                });
                info!(order_id = %order.order_id, plan_id = %receipt.plan_id, "subscription activated");
                self.events
                    .send(Event::SubscriptionActivated {
                        order_id: order.order_id.clone(),
                        user_id: order.user_id,
                        plan_id: receipt.plan_id,
                        expires_at: receipt.expires_at,
                    })
                    .await;
            }
            Err(e) => {
                warn!(order_id = %order.order_id, "subscription activation deferred: {}", e);
            }
        }
    }

    // Partner products are delivered by the partner out of band; we keep an
    // audit record of the confirmed purchase.
    async fn record_purchase(&self, order: &mut PaymentOrder) {
        order.fulfillment.purchase = Some(PurchaseRecord { at: Utc::now() });
        info!(order_id = %order.order_id, "partner purchase recorded");
        self.events
            .send(Event::PartnerPurchaseRecorded {
                order_id: order.order_id.clone(),
                user_id: order.user_id,
                partner_id: order.partner_id.clone(),
            })
            .await;
    }
}
