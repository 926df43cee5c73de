//! Transaction Lifecycle Controller: id assignment, status transitions and
//! idempotency bookkeeping.

use super::receipt::Receipt;
use super::store::UnitOfWork;
use crate::domain::ids::{TransactionId, UserId};
use crate::domain::records::IdempotencyRecord;
use crate::domain::transaction::{NewTransaction, Transaction, TransactionStatus, TransactionType};
use crate::error::Result;
use chrono::Utc;
use tracing::debug;

fn scoped_key(user_id: &UserId, key: &str) -> String {
    format!("{}:{}", user_id, key)
}

impl UnitOfWork {
    /// Persists a new PENDING transaction under a fresh id.
    ///
    /// When `new.idempotency_key` is set, the key is bound to the id in the
    /// same unit of work. `initiator` scopes the key.
    pub async fn open_transaction(
        &mut self,
        kind: TransactionType,
        initiator: &UserId,
        new: NewTransaction,
    ) -> Result<Transaction> {
        let now = Utc::now();
        let mut id = TransactionId::generate(now);
        while self.get::<Transaction>(id.as_str()).await?.is_some() {
            id = TransactionId::generate(now);
        }
        let tx = Transaction::open(id, kind, new, now);
        if let Some(key) = &tx.idempotency_key {
            self.put(&IdempotencyRecord {
                key: scoped_key(initiator, key),
                transaction_id: tx.id.clone(),
            })?;
        }
        self.put(&tx)?;
        debug!(transaction_id = %tx.id, kind = %tx.kind, "transaction opened");
        Ok(tx)
    }

    pub fn save_transaction(&mut self, tx: &Transaction) -> Result<()> {
        self.put(tx)
    }

    pub fn mark_processing(&mut self, tx: &mut Transaction) -> Result<()> {
        tx.transition(TransactionStatus::Processing)?;
        self.put(tx)
    }

    pub fn mark_completed(&mut self, tx: &mut Transaction) -> Result<()> {
        tx.complete(Utc::now())?;
        self.put(tx)
    }

    pub fn mark_failed(&mut self, tx: &mut Transaction, reason: &str) -> Result<()> {
        tx.fail(reason)?;
        self.put(tx)
    }

    /// The transaction an earlier request with the same key produced, if any.
    pub async fn find_replay(
        &self,
        initiator: &UserId,
        key: Option<&str>,
    ) -> Result<Option<Transaction>> {
        let Some(key) = key else {
            return Ok(None);
        };
        match self
            .get::<IdempotencyRecord>(&scoped_key(initiator, key))
            .await?
        {
            Some(record) => Ok(Some(self.transaction(&record.transaction_id).await?)),
            None => Ok(None),
        }
    }

    /// Receipt for a replayed request, with the parties' current balances.
    pub async fn replay_receipt(&self, tx: &Transaction) -> Result<Receipt> {
        let mut receipt = Receipt::new(tx);
        receipt.replayed = true;
        for wallet_id in [&tx.sender_wallet_id, &tx.receiver_wallet_id]
            .into_iter()
            .flatten()
        {
            receipt.push_balance(&self.wallet(wallet_id).await?);
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use crate::application::store::Store;
    use crate::domain::ids::UserId;
    use crate::domain::transaction::{NewTransaction, TransactionStatus, TransactionType};
    use crate::error::LedgerError;
    use crate::infrastructure::in_memory::InMemoryBackend;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_open_binds_idempotency_key_per_user() {
        let store = Store::new(Box::new(InMemoryBackend::new()));
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let mut uow = store.begin().await;
        let tx = uow
            .open_transaction(
                TransactionType::CashOut,
                &alice,
                NewTransaction {
                    amount: dec!(10.00),
                    idempotency_key: Some("k-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let uow = store.begin().await;
        let replay = uow.find_replay(&alice, Some("k-1")).await.unwrap().unwrap();
        assert_eq!(replay.id, tx.id);
        assert!(uow.find_replay(&bob, Some("k-1")).await.unwrap().is_none());
        assert!(uow.find_replay(&alice, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_persist() {
        let store = Store::new(Box::new(InMemoryBackend::new()));
        let user = UserId::new("alice");
        let mut uow = store.begin().await;
        let mut tx = uow
            .open_transaction(TransactionType::CashOut, &user, NewTransaction::default())
            .await
            .unwrap();
        uow.mark_processing(&mut tx).unwrap();
        uow.mark_completed(&mut tx).unwrap();
        assert!(matches!(
            uow.mark_failed(&mut tx, "too late"),
            Err(LedgerError::InvalidTransition { .. })
        ));
        uow.commit().await.unwrap();

        let uow = store.begin().await;
        let stored = uow.transaction(&tx.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert!(stored.completed_at.is_some());
    }
}
