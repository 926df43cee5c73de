//! Platform Reserve: the single platform-owned account and its audit trail.
//!
//! Every balance move appends a [`ReserveTransaction`] in the same unit of
//! work, so the audit trail replays to the stored balance.

use super::engine::WalletEngine;
use super::store::{RESERVE_KEY, UnitOfWork};
use crate::domain::money::{Amount, BalanceChange};
use crate::domain::reserve::{
    PlatformReserve, ReconciliationReport, ReserveDirection, ReserveMemo, ReserveStatistics,
    ReserveTransaction, ReserveTransactionType, reconcile,
};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

impl UnitOfWork {
    /// Locks and reads the reserve row.
    pub async fn reserve(&mut self) -> Result<PlatformReserve> {
        self.lock_reserve().await?;
        self.fetch("Platform reserve", RESERVE_KEY).await
    }

    pub async fn reserve_audit(&mut self) -> Result<Vec<ReserveTransaction>> {
        self.lock_reserve().await?;
        self.scan("").await
    }

    pub async fn credit_reserve(
        &mut self,
        amount: Decimal,
        kind: ReserveTransactionType,
        memo: ReserveMemo,
    ) -> Result<BalanceChange> {
        let amount = Amount::new(amount)?.value();
        let mut reserve = self.reserve().await?;
        let change = reserve.credit(amount, kind, Utc::now());
        self.record_reserve_move(reserve, kind, ReserveDirection::Credit, amount, change, memo)?;
        Ok(change)
    }

    pub async fn debit_reserve(
        &mut self,
        amount: Decimal,
        kind: ReserveTransactionType,
        memo: ReserveMemo,
    ) -> Result<BalanceChange> {
        let amount = Amount::new(amount)?.value();
        let mut reserve = self.reserve().await?;
        let change = reserve.debit(amount, kind, Utc::now())?;
        self.record_reserve_move(reserve, kind, ReserveDirection::Debit, amount, change, memo)?;
        Ok(change)
    }

    fn record_reserve_move(
        &mut self,
        mut reserve: PlatformReserve,
        kind: ReserveTransactionType,
        direction: ReserveDirection,
        amount: Decimal,
        change: BalanceChange,
        memo: ReserveMemo,
    ) -> Result<()> {
        reserve.last_entry_id += 1;
        let row = ReserveTransaction {
            id: reserve.last_entry_id,
            kind,
            direction,
            amount,
            balance_before: change.before,
            balance_after: change.after,
            memo,
            created_at: Utc::now(),
        };
        self.put(&reserve)?;
        self.put(&row)
    }
}

impl WalletEngine {
    /// Creates the reserve row if it does not exist yet. The opening balance
    /// is booked as an ADJUSTMENT credit so reconciliation holds from the start.
    pub async fn initialize_reserve(&self, opening_balance: Decimal) -> Result<PlatformReserve> {
        let mut uow = self.store().begin_reserve().await;
        if let Some(existing) = uow.get::<PlatformReserve>(RESERVE_KEY).await? {
            return Ok(existing);
        }
        uow.put(&PlatformReserve::default())?;
        if opening_balance > Decimal::ZERO {
            uow.credit_reserve(
                opening_balance,
                ReserveTransactionType::Adjustment,
                ReserveMemo::new("Opening balance"),
            )
            .await?;
        }
        let reserve = uow.reserve().await?;
        uow.commit().await?;
        info!(balance = %reserve.balance, "platform reserve initialized");
        Ok(reserve)
    }

    /// Credits the reserve outside any wallet transaction (top-ups, revenue).
    pub async fn reserve_add_balance(
        &self,
        amount: Decimal,
        kind: ReserveTransactionType,
        memo: ReserveMemo,
    ) -> Result<PlatformReserve> {
        let mut uow = self.store().begin_reserve().await;
        let change = uow.credit_reserve(amount, kind, memo).await?;
        let reserve = uow.reserve().await?;
        uow.commit().await?;
        info!(?kind, %amount, before = %change.before, after = %change.after, "reserve credited");
        Ok(reserve)
    }

    pub async fn reserve_deduct_balance(
        &self,
        amount: Decimal,
        kind: ReserveTransactionType,
        memo: ReserveMemo,
    ) -> Result<PlatformReserve> {
        let mut uow = self.store().begin_reserve().await;
        let change = match uow.debit_reserve(amount, kind, memo).await {
            Ok(change) => change,
            Err(e) => {
                if let LedgerError::InsufficientReserve { .. } = e {
                    warn!(?kind, %amount, "reserve deduction refused: {}", e);
                }
                return Err(e);
            }
        };
        let reserve = uow.reserve().await?;
        uow.commit().await?;
        info!(?kind, %amount, before = %change.before, after = %change.after, "reserve debited");
        Ok(reserve)
    }

    pub async fn reserve_balance(&self) -> Result<Decimal> {
        let mut uow = self.store().begin_reserve().await;
        Ok(uow.reserve().await?.balance.value())
    }

    /// Read-only; safe to run any number of times.
    pub async fn reconcile_reserve(&self) -> Result<ReconciliationReport> {
        let mut uow = self.store().begin_reserve().await;
        let reserve = uow.reserve().await?;
        let audit = uow.reserve_audit().await?;
        let report = reconcile(&reserve, &audit);
        if !report.success {
            warn!(discrepancy = %report.discrepancy, "{}", report.message);
        }
        Ok(report)
    }

    pub async fn reserve_statistics(&self) -> Result<ReserveStatistics> {
        let mut uow = self.store().begin_reserve().await;
        Ok(uow.reserve().await?.statistics())
    }

    pub async fn reserve_transactions(&self) -> Result<Vec<ReserveTransaction>> {
        let mut uow = self.store().begin_reserve().await;
        uow.reserve_audit().await
    }
}
