//! Wallet Balance Manager: the only code that writes wallet rows.

use super::store::UnitOfWork;
use crate::domain::ids::WalletId;
use crate::domain::money::BalanceChange;
use crate::domain::wallet::SpendingPeriod;
use crate::error::Result;
use chrono::Utc;
use rust_decimal::Decimal;

impl UnitOfWork {
    pub async fn apply_delta(
        &mut self,
        wallet_id: &WalletId,
        balance_delta: Decimal,
        available_delta: Decimal,
    ) -> Result<BalanceChange> {
        let mut wallet = self.wallet(wallet_id).await?;
        let change = wallet.apply_delta(balance_delta, available_delta, Utc::now())?;
        self.put(&wallet)?;
        Ok(change)
    }

    pub async fn increment_spending(
        &mut self,
        wallet_id: &WalletId,
        amount: Decimal,
        period: SpendingPeriod,
    ) -> Result<()> {
        let mut wallet = self.wallet(wallet_id).await?;
        wallet.increment_spending(amount, period);
        self.put(&wallet)
    }

    pub async fn check_spending_limit(
        &self,
        wallet_id: &WalletId,
        amount: Decimal,
        period: SpendingPeriod,
    ) -> Result<bool> {
        Ok(self.wallet(wallet_id).await?.can_spend(amount, period))
    }

    /// Conditional debit: funds and every listed limit are checked against the
    /// row as read under the ledger lock, then balance and counters move together.
    pub async fn debit_wallet(
        &mut self,
        wallet_id: &WalletId,
        amount: Decimal,
        periods: &[SpendingPeriod],
    ) -> Result<BalanceChange> {
        let mut wallet = self.wallet(wallet_id).await?;
        let change = wallet.debit_within_limits(amount, periods, Utc::now())?;
        self.put(&wallet)?;
        Ok(change)
    }

    pub async fn credit_wallet(&mut self, wallet_id: &WalletId, amount: Decimal) -> Result<BalanceChange> {
        let mut wallet = self.wallet(wallet_id).await?;
        let change = wallet.credit(amount, Utc::now())?;
        self.put(&wallet)?;
        Ok(change)
    }
}
