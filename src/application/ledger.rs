//! Ledger Store operations and the posting helpers protocols build their
//! double-entry legs from. Every helper moves the account balance and appends
//! the matching entry in the same unit of work.

use super::store::{UnitOfWork, ledger_prefix};
use crate::domain::ids::{BillerId, TransactionId, WalletId};
use crate::domain::ledger::{
    EntryType, ExternalAccount, ExternalBalance, LedgerAccount, LedgerEntry, is_balanced,
};
use crate::domain::money::{Balance, BalanceChange};
use crate::domain::records::{OutboxMessage, SideEffect};
use crate::domain::reserve::{ReserveMemo, ReserveTransactionType};
use crate::domain::wallet::SpendingPeriod;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::warn;

/// Where a collected fee ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeCollection {
    Collected,
    /// Held in fee suspense with a pending outbox message.
    Suspended,
}

impl UnitOfWork {
    /// Entries of one transaction in append order.
    pub async fn entries_for(&self, transaction_id: &TransactionId) -> Result<Vec<LedgerEntry>> {
        self.scan(&ledger_prefix(transaction_id)).await
    }

    pub async fn append_entry(
        &mut self,
        transaction_id: &TransactionId,
        account: LedgerAccount,
        entry_type: EntryType,
        amount: Decimal,
        change: BalanceChange,
        description: impl Into<String>,
    ) -> Result<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::ValidationError(format!(
                "Ledger entry amount must be positive, got {}",
                amount
            )));
        }
        let sequence = self.entries_for(transaction_id).await?.len() as u32;
        let entry = LedgerEntry::new(
            transaction_id.clone(),
            sequence,
            account,
            entry_type,
            amount,
            change,
            Some(description.into()),
            Utc::now(),
        );
        self.put(&entry)?;
        Ok(entry)
    }

    /// Σdebits = Σcredits over the transaction's entries.
    pub async fn verify_balance(&self, transaction_id: &TransactionId) -> Result<bool> {
        Ok(is_balanced(&self.entries_for(transaction_id).await?))
    }

    /// Debits a wallet within the given spending limits and records the entry.
    pub async fn post_wallet_debit(
        &mut self,
        transaction_id: &TransactionId,
        wallet_id: &WalletId,
        amount: Decimal,
        periods: &[SpendingPeriod],
        description: &str,
    ) -> Result<BalanceChange> {
        let change = self.debit_wallet(wallet_id, amount, periods).await?;
        self.append_entry(
            transaction_id,
            LedgerAccount::Wallet(wallet_id.clone()),
            EntryType::Debit,
            amount,
            change,
            description,
        )
        .await?;
        Ok(change)
    }

    pub async fn post_wallet_credit(
        &mut self,
        transaction_id: &TransactionId,
        wallet_id: &WalletId,
        amount: Decimal,
        description: &str,
    ) -> Result<BalanceChange> {
        let change = self.credit_wallet(wallet_id, amount).await?;
        self.append_entry(
            transaction_id,
            LedgerAccount::Wallet(wallet_id.clone()),
            EntryType::Credit,
            amount,
            change,
            description,
        )
        .await?;
        Ok(change)
    }

    pub async fn post_reserve_credit(
        &mut self,
        transaction_id: &TransactionId,
        amount: Decimal,
        kind: ReserveTransactionType,
        memo: ReserveMemo,
    ) -> Result<BalanceChange> {
        let description = memo.description.clone();
        let change = self
            .credit_reserve(amount, kind, memo.for_transaction(transaction_id))
            .await?;
        self.append_entry(
            transaction_id,
            LedgerAccount::Reserve,
            EntryType::Credit,
            amount,
            change,
            description,
        )
        .await?;
        Ok(change)
    }

    pub async fn post_reserve_debit(
        &mut self,
        transaction_id: &TransactionId,
        amount: Decimal,
        kind: ReserveTransactionType,
        memo: ReserveMemo,
    ) -> Result<BalanceChange> {
        let description = memo.description.clone();
        let change = self
            .debit_reserve(amount, kind, memo.for_transaction(transaction_id))
            .await?;
        self.append_entry(
            transaction_id,
            LedgerAccount::Reserve,
            EntryType::Debit,
            amount,
            change,
            description,
        )
        .await?;
        Ok(change)
    }

    /// Credits a collected fee to the reserve. When the reserve cannot take it,
    /// the reserve writes are undone, the fee is parked in fee suspense and an
    /// outbox message credits the reserve later. The caller's transaction
    /// completes either way.
    pub async fn collect_fee(
        &mut self,
        transaction_id: &TransactionId,
        fee: Decimal,
        memo: ReserveMemo,
    ) -> Result<FeeCollection> {
        let savepoint = self.savepoint();
        let description = memo.description.clone();
        let err = match self
            .post_reserve_credit(
                transaction_id,
                fee,
                ReserveTransactionType::FeeCollected,
                memo.clone(),
            )
            .await
        {
            Ok(_) => return Ok(FeeCollection::Collected),
            Err(e) => e,
        };
        self.rollback_to(savepoint);
        warn!(
            %transaction_id,
            %fee,
            "reserve fee credit deferred to outbox: {}",
            err
        );
        self.post_external(
            transaction_id,
            ExternalAccount::FeeSuspense,
            EntryType::Credit,
            fee,
            &description,
        )
        .await?;
        self.put(&OutboxMessage::new(
            transaction_id.clone(),
            SideEffect::ReserveFee { amount: fee, memo },
            Utc::now(),
        ))?;
        Ok(FeeCollection::Suspended)
    }

    /// Moves a suspended fee into the reserve.
    pub async fn settle_suspended_fee(
        &mut self,
        transaction_id: &TransactionId,
        fee: Decimal,
        memo: ReserveMemo,
    ) -> Result<BalanceChange> {
        let description = memo.description.clone();
        let change = self
            .post_reserve_credit(
                transaction_id,
                fee,
                ReserveTransactionType::FeeCollected,
                memo,
            )
            .await?;
        self.post_external(
            transaction_id,
            ExternalAccount::FeeSuspense,
            EntryType::Debit,
            fee,
            &description,
        )
        .await?;
        Ok(change)
    }

    /// Moves an external clearing balance. These may go negative.
    pub async fn post_external(
        &mut self,
        transaction_id: &TransactionId,
        account: ExternalAccount,
        entry_type: EntryType,
        amount: Decimal,
        description: &str,
    ) -> Result<BalanceChange> {
        let mut clearing = self
            .get::<ExternalBalance>(account.as_str())
            .await?
            .unwrap_or(ExternalBalance {
                account,
                balance: Decimal::ZERO,
            });
        let before = clearing.balance;
        clearing.balance = match entry_type {
            EntryType::Debit => before - amount,
            EntryType::Credit => before + amount,
        };
        let change = BalanceChange::new(before, clearing.balance);
        self.put(&clearing)?;
        self.append_entry(
            transaction_id,
            LedgerAccount::External(account),
            entry_type,
            amount,
            change,
            description,
        )
        .await?;
        Ok(change)
    }

    pub async fn post_biller_credit(
        &mut self,
        transaction_id: &TransactionId,
        biller_id: &BillerId,
        amount: Decimal,
        description: &str,
    ) -> Result<BalanceChange> {
        let mut biller = self.biller(biller_id).await?;
        let before = biller.balance.value();
        biller.balance += Balance::new(amount);
        biller.total_payments += 1;
        let change = BalanceChange::new(before, biller.balance.value());
        self.put(&biller)?;
        self.append_entry(
            transaction_id,
            LedgerAccount::Biller(biller_id.clone()),
            EntryType::Credit,
            amount,
            change,
            description,
        )
        .await?;
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use crate::application::store::Store;
    use crate::domain::ids::TransactionId;
    use crate::domain::ledger::{EntryType, ExternalAccount, LedgerAccount};
    use crate::domain::money::BalanceChange;
    use crate::error::LedgerError;
    use crate::infrastructure::in_memory::InMemoryBackend;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_append_assigns_sequence_and_rejects_zero() {
        let store = Store::new(Box::new(InMemoryBackend::new()));
        let tx = TransactionId::new("TXN-20260101-000001");
        let mut uow = store.begin().await;

        let first = uow
            .append_entry(
                &tx,
                LedgerAccount::Reserve,
                EntryType::Credit,
                dec!(5.00),
                BalanceChange::new(dec!(0), dec!(5.00)),
                "fee",
            )
            .await
            .unwrap();
        assert_eq!(first.sequence, 0);

        let err = uow
            .append_entry(
                &tx,
                LedgerAccount::Reserve,
                EntryType::Debit,
                dec!(0.00),
                BalanceChange::new(dec!(5.00), dec!(5.00)),
                "zero",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationError(_)));
        assert!(!uow.verify_balance(&tx).await.unwrap());
    }

    #[tokio::test]
    async fn test_external_postings_balance_each_other() {
        let store = Store::new(Box::new(InMemoryBackend::new()));
        let tx = TransactionId::new("TXN-20260101-000002");
        let mut uow = store.begin().await;

        let out = uow
            .post_external(&tx, ExternalAccount::CardNetwork, EntryType::Debit, dec!(40), "pull")
            .await
            .unwrap();
        assert_eq!(out, BalanceChange::new(dec!(0), dec!(-40)));
        uow.post_external(&tx, ExternalAccount::BankNetwork, EntryType::Credit, dec!(40), "push")
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let uow = store.begin().await;
        let entries = uow.entries_for(&tx).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 1);
        assert!(uow.verify_balance(&tx).await.unwrap());
    }
}
