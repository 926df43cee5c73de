//! Transaction boundary over a [`StorageBackend`].
//!
//! A [`UnitOfWork`] stages every write in an overlay and hands the whole
//! overlay to the backend as one atomic batch on [`UnitOfWork::commit`].
//! Dropping it without committing discards the overlay, which is the rollback.
//!
//! Isolation comes from two pessimistic locks owned by the [`Store`]:
//! the ledger lock covers every table except the reserve pair, the reserve
//! lock covers the reserve row and its audit log. A unit of work opened with
//! [`Store::begin`] holds the ledger lock for its whole lifetime and takes the
//! reserve lock on first reserve access; [`Store::begin_reserve`] holds the
//! reserve lock only. Locks are always taken ledger first.

use crate::domain::ids::{AgentCode, BillerId, TransactionId, UserId, WalletId};
use crate::domain::ledger::{ExternalBalance, LedgerEntry};
use crate::domain::party::{Agent, Biller, UserProfile};
use crate::domain::ports::{StorageBackend, StorageBackendBox, Table, WriteOp};
use crate::domain::records::{
    AgentCashout, BankTransfer, BillPayment, IdempotencyRecord, OutboxMessage,
};
use crate::domain::reserve::{PlatformReserve, ReserveTransaction};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{LedgerError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// A value persisted in exactly one table under a derived key.
pub trait Record: Serialize + DeserializeOwned + Send {
    const TABLE: Table;
    fn key(&self) -> String;
}

pub const RESERVE_KEY: &str = "platform";

pub fn ledger_key(transaction_id: &TransactionId, sequence: u32) -> String {
    format!("{}/{:06}", transaction_id, sequence)
}

pub fn ledger_prefix(transaction_id: &TransactionId) -> String {
    format!("{}/", transaction_id)
}

macro_rules! record {
    ($ty:ty, $table:expr, |$r:ident| $key:expr) => {
        impl Record for $ty {
            const TABLE: Table = $table;
            fn key(&self) -> String {
                let $r = self;
                $key
            }
        }
    };
}

record!(UserProfile, Table::Users, |r| r.user_id.to_string());
record!(Agent, Table::Agents, |r| r.code.to_string());
record!(Biller, Table::Billers, |r| r.id.to_string());
record!(Wallet, Table::Wallets, |r| r.id.to_string());
record!(Transaction, Table::Transactions, |r| r.id.to_string());
record!(LedgerEntry, Table::Ledger, |r| ledger_key(
    &r.transaction_id,
    r.sequence
));
record!(ExternalBalance, Table::ExternalAccounts, |r| r
    .account
    .as_str()
    .to_string());
record!(AgentCashout, Table::Cashouts, |r| r.transaction_id.to_string());
record!(BankTransfer, Table::BankTransfers, |r| r
    .transaction_id
    .to_string());
record!(BillPayment, Table::BillPayments, |r| r
    .transaction_id
    .to_string());
record!(OutboxMessage, Table::Outbox, |r| r.id.clone());
record!(IdempotencyRecord, Table::Idempotency, |r| r.key.clone());
record!(PlatformReserve, Table::Reserve, |_r| RESERVE_KEY.to_string());
record!(ReserveTransaction, Table::ReserveLog, |r| format!(
    "{:020}",
    r.id
));

/// Shared handle to the storage backend and its locks. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    ledger_lock: Arc<Mutex<()>>,
    reserve_lock: Arc<Mutex<()>>,
}

impl Store {
    pub fn new(backend: StorageBackendBox) -> Self {
        Self {
            backend: Arc::from(backend),
            ledger_lock: Arc::new(Mutex::new(())),
            reserve_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Opens a unit of work over every table.
    pub async fn begin(&self) -> UnitOfWork {
        let ledger_guard = self.ledger_lock.clone().lock_owned().await;
        UnitOfWork::new(
            self.backend.clone(),
            self.reserve_lock.clone(),
            Some(ledger_guard),
            None,
        )
    }

    /// Opens a unit of work restricted to the reserve row and its audit log.
    pub async fn begin_reserve(&self) -> UnitOfWork {
        let reserve_guard = self.reserve_lock.clone().lock_owned().await;
        UnitOfWork::new(
            self.backend.clone(),
            self.reserve_lock.clone(),
            None,
            Some(reserve_guard),
        )
    }
}

/// Overlay snapshot taken by [`UnitOfWork::savepoint`].
pub struct Savepoint(BTreeMap<(Table, String), Vec<u8>>);

pub struct UnitOfWork {
    backend: Arc<dyn StorageBackend>,
    reserve_lock: Arc<Mutex<()>>,
    ledger_guard: Option<OwnedMutexGuard<()>>,
    reserve_guard: Option<OwnedMutexGuard<()>>,
    overlay: BTreeMap<(Table, String), Vec<u8>>,
    committed: bool,
}

impl UnitOfWork {
    fn new(
        backend: Arc<dyn StorageBackend>,
        reserve_lock: Arc<Mutex<()>>,
        ledger_guard: Option<OwnedMutexGuard<()>>,
        reserve_guard: Option<OwnedMutexGuard<()>>,
    ) -> Self {
        Self {
            backend,
            reserve_lock,
            ledger_guard,
            reserve_guard,
            overlay: BTreeMap::new(),
            committed: false,
        }
    }

    /// Takes the reserve row lock if this unit of work does not hold it yet.
    pub async fn lock_reserve(&mut self) -> Result<()> {
        if self.reserve_guard.is_none() {
            if self.ledger_guard.is_none() {
                return Err(LedgerError::StorageError(
                    "unit of work holds no lock".to_string(),
                ));
            }
            self.reserve_guard = Some(self.reserve_lock.clone().lock_owned().await);
        }
        Ok(())
    }

    fn ensure_scope(&self, table: Table) -> Result<()> {
        let held = if table.is_reserve() {
            self.reserve_guard.is_some()
        } else {
            self.ledger_guard.is_some()
        };
        if held {
            Ok(())
        } else {
            Err(LedgerError::StorageError(format!(
                "table {} accessed without its lock",
                table.name()
            )))
        }
    }

    pub async fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        self.ensure_scope(R::TABLE)?;
        let staged = self.overlay.get(&(R::TABLE, key.to_string()));
        let bytes = match staged {
            Some(bytes) => Some(bytes.clone()),
            None => self.backend.get(R::TABLE, key).await?,
        };
        bytes
            .map(|b| serde_json::from_slice(&b).map_err(LedgerError::from))
            .transpose()
    }

    /// Like [`UnitOfWork::get`] but a missing record is an error.
    pub async fn fetch<R: Record>(&self, kind: &'static str, key: &str) -> Result<R> {
        self.get(key)
            .await?
            .ok_or_else(|| LedgerError::not_found(kind, key))
    }

    pub fn put<R: Record>(&mut self, record: &R) -> Result<()> {
        self.ensure_scope(R::TABLE)?;
        let bytes = serde_json::to_vec(record)?;
        self.overlay.insert((R::TABLE, record.key()), bytes);
        Ok(())
    }

    /// All records whose key starts with `prefix`, committed and staged, in key order.
    pub async fn scan<R: Record>(&self, prefix: &str) -> Result<Vec<R>> {
        self.ensure_scope(R::TABLE)?;
        let mut merged: BTreeMap<String, Vec<u8>> = self
            .backend
            .scan_prefix(R::TABLE, prefix)
            .await?
            .into_iter()
            .collect();
        let staged = self
            .overlay
            .range((R::TABLE, prefix.to_string())..)
            .take_while(|((table, key), _)| *table == R::TABLE && key.starts_with(prefix));
        for ((_, key), bytes) in staged {
            merged.insert(key.clone(), bytes.clone());
        }
        merged
            .values()
            .map(|b| serde_json::from_slice(b).map_err(LedgerError::from))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn staged_writes(&self) -> usize {
        self.overlay.len()
    }

    /// Marks the current overlay so a failed step can be undone without
    /// abandoning the whole unit of work.
    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.overlay.clone())
    }

    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        self.overlay = savepoint.0;
    }

    pub async fn commit(mut self) -> Result<()> {
        let batch: Vec<WriteOp> = std::mem::take(&mut self.overlay)
            .into_iter()
            .map(|((table, key), bytes)| (table, key, bytes))
            .collect();
        if !batch.is_empty() {
            self.backend.write(batch).await?;
        }
        self.committed = true;
        Ok(())
    }

    // Typed accessors for the records protocols look up by id.

    pub async fn user(&self, id: &UserId) -> Result<UserProfile> {
        self.fetch("User", id.as_str()).await
    }

    pub async fn wallet(&self, id: &WalletId) -> Result<Wallet> {
        self.fetch("Wallet", id.as_str()).await
    }

    pub async fn agent(&self, code: &AgentCode) -> Result<Agent> {
        self.fetch("Agent", code.as_str()).await
    }

    pub async fn biller(&self, id: &BillerId) -> Result<Biller> {
        self.fetch("Biller", id.as_str()).await
    }

    pub async fn transaction(&self, id: &TransactionId) -> Result<Transaction> {
        self.fetch("Transaction", id.as_str()).await
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.committed && !self.overlay.is_empty() {
            debug!(staged = self.overlay.len(), "rolling back unit of work");
        }
    }
}
