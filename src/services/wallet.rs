use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{entities::wallet_ledger_entry, errors::ServiceError};

/// Result of crediting coins to a user's wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCreditReceipt {
    pub coins_credited: i64,
    pub new_balance: i64,
}

/// Wallet collaborator. Credits are tagged with an idempotency token (the
/// order id); replaying the same token returns the original receipt
/// without writing a second entry. Credits for the same user are
/// serialized, so concurrent credits with distinct tokens chain their
/// balances instead of both extending the same predecessor.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    async fn credit_coins(
        &self,
        user_id: Uuid,
        coins: i64,
        idempotency_token: &str,
    ) -> Result<WalletCreditReceipt, ServiceError>;
}

/// Wallet ledger backed by the append-only `wallet_ledger_entries` table.
#[derive(Clone)]
pub struct SeaOrmWalletLedger {
    db: Arc<DatabaseConnection>,
    user_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SeaOrmWalletLedger {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl WalletLedger for SeaOrmWalletLedger {
    #[instrument(skip(self), fields(user_id = %user_id, coins = coins))]
    async fn credit_coins(
        &self,
        user_id: Uuid,
        coins: i64,
        idempotency_token: &str,
    ) -> Result<WalletCreditReceipt, ServiceError> {
        if coins <= 0 {
            return Err(ServiceError::FulfillmentError(format!(
                "refusing non-positive coin credit of {}",
                coins
            )));
        }

        // Per-user lock: two credits with different tokens must observe
        // each other's balance write, including the very first entry
        // where there is no row to lock yet.
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let token = idempotency_token.to_string();
        let receipt = self
            .db
            .transaction::<_, WalletCreditReceipt, ServiceError>(move |txn| {
                Box::pin(async move {
                    // Replay of an already-applied credit returns the
                    // original receipt.
                    if let Some(existing) = wallet_ledger_entry::Entity::find()
                        .filter(wallet_ledger_entry::Column::IdempotencyToken.eq(&token))
                        .one(txn)
                        .await?
                    {
                        return Ok(WalletCreditReceipt {
                            coins_credited: existing.delta,
                            new_balance: existing.balance_after,
                        });
                    }

                    // Row lock covers a second service instance sharing
                    // the database; the id tiebreak keeps the read
                    // deterministic for equal timestamps.
                    let balance = wallet_ledger_entry::Entity::find()
                        .filter(wallet_ledger_entry::Column::UserId.eq(user_id))
                        .order_by_desc(wallet_ledger_entry::Column::CreatedAt)
                        .order_by_desc(wallet_ledger_entry::Column::Id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .map(|entry| entry.balance_after)
                        .unwrap_or(0);

                    let new_balance = balance + coins;
                    let entry = wallet_ledger_entry::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        user_id: Set(user_id),
                        delta: Set(coins),
                        balance_after: Set(new_balance),
                        idempotency_token: Set(token),
                        reason: Set("coin_bundle_purchase".to_string()),
                        created_at: Set(Utc::now()),
                    };
                    entry.insert(txn).await?;

                    Ok(WalletCreditReceipt {
                        coins_credited: coins,
                        new_balance,
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
            new_balance = receipt.new_balance,
            "wallet credit applied"
        );
        Ok(receipt)
    }
}

/// In-memory ledger with the same serialization and replay contract.
/// Used by tests as the reference model for the ledger behavior.
#[derive(Default)]
pub struct InMemoryWalletLedger {
    receipts: DashMap<String, WalletCreditReceipt>,
    balances: DashMap<Uuid, i64>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl InMemoryWalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, user_id: Uuid) -> i64 {
        self.balances.get(&user_id).map(|b| *b).unwrap_or(0)
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl WalletLedger for InMemoryWalletLedger {
    async fn credit_coins(
        &self,
        user_id: Uuid,
        coins: i64,
        idempotency_token: &str,
    ) -> Result<WalletCreditReceipt, ServiceError> {
        if coins <= 0 {
            return Err(ServiceError::FulfillmentError(format!(
                "refusing non-positive coin credit of {}",
                coins
            )));
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.receipts.get(idempotency_token) {
            return Ok(existing.clone());
        }

        let mut balance = self.balances.entry(user_id).or_insert(0);
        *balance += coins;
        let receipt = WalletCreditReceipt {
            coins_credited: coins,
            new_balance: *balance,
        };
        drop(balance);
        self.receipts
            .insert(idempotency_token.to_string(), receipt.clone());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_credits_with_distinct_tokens_chain_the_balance() {
        let ledger = Arc::new(InMemoryWalletLedger::new());
        let user_id = Uuid::new_v4();

        // Two different orders paying out together must not both extend
        // the same predecessor balance.
        let l1 = ledger.clone();
        let l2 = ledger.clone();
        let t1 = tokio::spawn(async move { l1.credit_coins(user_id, 500, "coins_a").await });
        let t2 = tokio::spawn(async move { l2.credit_coins(user_id, 500, "coins_b").await });

        let r1 = t1.await.unwrap().unwrap();
        let r2 = t2.await.unwrap().unwrap();

        assert_eq!(ledger.balance_of(user_id), 1000);
        let mut balances = [r1.new_balance, r2.new_balance];
        balances.sort_unstable();
        assert_eq!(balances, [500, 1000]);
    }

    #[tokio::test]
    async fn replayed_token_returns_the_original_receipt() {
        let ledger = InMemoryWalletLedger::new();
        let user_id = Uuid::new_v4();

        let first = ledger.credit_coins(user_id, 500, "coins_a").await.unwrap();
        let replay = ledger.credit_coins(user_id, 500, "coins_a").await.unwrap();

        assert_eq!(first, replay);
        assert_eq!(ledger.balance_of(user_id), 500);
    }

    #[tokio::test]
    async fn rejects_non_positive_credits() {
        let ledger = InMemoryWalletLedger::new();
        let err = ledger
            .credit_coins(Uuid::new_v4(), 0, "coins_a")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FulfillmentError(_)));
    }
}
