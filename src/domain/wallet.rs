use super::ids::{UserId, WalletId};
use super::money::{Balance, BalanceChange};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window a spending counter accumulates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendingPeriod {
    Daily,
    Monthly,
}

impl SpendingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpendingPeriod::Daily => "Daily",
            SpendingPeriod::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for SpendingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings applied to every freshly created wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletDefaults {
    pub currency: String,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
}

impl Default for WalletDefaults {
    fn default() -> Self {
        Self {
            currency: "BDT".to_string(),
            daily_limit: dec!(50000.00),
            monthly_limit: dec!(200000.00),
        }
    }
}

/// The monetary state of one user.
///
/// `available_balance` is the spendable part of `balance`; the difference is
/// reserved for in-flight operations. Every mutation goes through
/// [`Wallet::apply_delta`] which keeps `0 <= available <= balance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Balance,
    pub available_balance: Balance,
    pub pending_balance: Balance,
    pub currency: String,
    pub daily_limit: Balance,
    pub monthly_limit: Balance,
    pub daily_spent: Balance,
    pub monthly_spent: Balance,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(id: WalletId, user_id: UserId, defaults: &WalletDefaults, at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            balance: Balance::ZERO,
            available_balance: Balance::ZERO,
            pending_balance: Balance::ZERO,
            currency: defaults.currency.clone(),
            daily_limit: Balance::new(defaults.daily_limit),
            monthly_limit: Balance::new(defaults.monthly_limit),
            daily_spent: Balance::ZERO,
            monthly_spent: Balance::ZERO,
            last_transaction_at: None,
            created_at: at,
        }
    }

    /// Shifts both balances and returns the before/after pair of `balance`.
    ///
    /// Fails without touching the wallet when the result would leave either
    /// balance negative or `available_balance` above `balance`.
    pub fn apply_delta(
        &mut self,
        balance_delta: Decimal,
        available_delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<BalanceChange, LedgerError> {
        let balance = self.balance + Balance::new(balance_delta);
        let available = self.available_balance + Balance::new(available_delta);
        if balance.is_negative() || available.is_negative() {
            return Err(LedgerError::InsufficientFunds {
                required: (-available_delta).max(-balance_delta),
                available: self.available_balance.value(),
            });
        }
        if available > balance {
            return Err(LedgerError::ValidationError(format!(
                "Wallet {} available balance {} would exceed balance {}",
                self.id, available, balance
            )));
        }
        let change = BalanceChange::new(self.balance.value(), balance.value());
        self.balance = balance;
        self.available_balance = available;
        self.last_transaction_at = Some(at);
        Ok(change)
    }

    pub fn ensure_available(&self, required: Decimal) -> Result<(), LedgerError> {
        if self.available_balance.value() < required {
            return Err(LedgerError::InsufficientFunds {
                required,
                available: self.available_balance.value(),
            });
        }
        Ok(())
    }

    pub fn limit(&self, period: SpendingPeriod) -> Balance {
        match period {
            SpendingPeriod::Daily => self.daily_limit,
            SpendingPeriod::Monthly => self.monthly_limit,
        }
    }

    pub fn spent(&self, period: SpendingPeriod) -> Balance {
        match period {
            SpendingPeriod::Daily => self.daily_spent,
            SpendingPeriod::Monthly => self.monthly_spent,
        }
    }

    /// `spent + amount <= limit`; spending exactly up to the limit is allowed.
    pub fn can_spend(&self, amount: Decimal, period: SpendingPeriod) -> bool {
        self.spent(period).value() + amount <= self.limit(period).value()
    }

    pub fn ensure_within_limits(
        &self,
        amount: Decimal,
        periods: &[SpendingPeriod],
    ) -> Result<(), LedgerError> {
        for period in periods {
            if !self.can_spend(amount, *period) {
                return Err(LedgerError::LimitExceeded {
                    period: period.as_str(),
                    limit: self.limit(*period).value(),
                    spent: self.spent(*period).value(),
                    attempted: amount,
                });
            }
        }
        Ok(())
    }

    pub fn increment_spending(&mut self, amount: Decimal, period: SpendingPeriod) {
        match period {
            SpendingPeriod::Daily => self.daily_spent += Balance::new(amount),
            SpendingPeriod::Monthly => self.monthly_spent += Balance::new(amount),
        }
    }

    pub fn reset_spending(&mut self, period: SpendingPeriod) {
        match period {
            SpendingPeriod::Daily => self.daily_spent = Balance::ZERO,
            SpendingPeriod::Monthly => self.monthly_spent = Balance::ZERO,
        }
    }

    /// Checks funds and every listed limit, then debits and bumps the counters.
    ///
    /// Either all of it happens or none of it does.
    pub fn debit_within_limits(
        &mut self,
        amount: Decimal,
        periods: &[SpendingPeriod],
        at: DateTime<Utc>,
    ) -> Result<BalanceChange, LedgerError> {
        self.ensure_available(amount)?;
        self.ensure_within_limits(amount, periods)?;
        let change = self.apply_delta(-amount, -amount, at)?;
        for period in periods {
            self.increment_spending(amount, *period);
        }
        Ok(change)
    }

    pub fn credit(&mut self, amount: Decimal, at: DateTime<Utc>) -> Result<BalanceChange, LedgerError> {
        self.apply_delta(amount, amount, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_with(balance: Decimal) -> Wallet {
        let mut wallet = Wallet::new(
            WalletId::new("W0000001"),
            UserId::new("u1"),
            &WalletDefaults::default(),
            Utc::now(),
        );
        wallet.balance = Balance::new(balance);
        wallet.available_balance = Balance::new(balance);
        wallet
    }

    #[test]
    fn test_new_wallet_uses_defaults() {
        let wallet = wallet_with(Decimal::ZERO);
        assert_eq!(wallet.currency, "BDT");
        assert_eq!(wallet.daily_limit, Balance::new(dec!(50000.00)));
        assert_eq!(wallet.monthly_limit, Balance::new(dec!(200000.00)));
    }

    #[test]
    fn test_apply_delta_rejects_negative_available() {
        let mut wallet = wallet_with(dec!(10.00));
        let err = wallet.apply_delta(dec!(-20), dec!(-20), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(wallet.balance, Balance::new(dec!(10.00)));
    }

    #[test]
    fn test_apply_delta_rejects_available_above_balance() {
        let mut wallet = wallet_with(dec!(10.00));
        let err = wallet.apply_delta(dec!(0), dec!(5), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::ValidationError(_)));
        assert_eq!(wallet.available_balance, Balance::new(dec!(10.00)));
    }

    #[test]
    fn test_limit_boundary_is_inclusive() {
        let mut wallet = wallet_with(dec!(1000.00));
        wallet.daily_limit = Balance::new(dec!(100.00));
        wallet.daily_spent = Balance::new(dec!(90.00));
        assert!(wallet.can_spend(dec!(10.00), SpendingPeriod::Daily));
        assert!(!wallet.can_spend(dec!(10.01), SpendingPeriod::Daily));
    }

    #[test]
    fn test_debit_within_limits_is_all_or_nothing() {
        let mut wallet = wallet_with(dec!(1000.00));
        wallet.monthly_limit = Balance::new(dec!(50.00));

        let err = wallet
            .debit_within_limits(
                dec!(60.00),
                &[SpendingPeriod::Daily, SpendingPeriod::Monthly],
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::LimitExceeded {
                period: "Monthly",
                ..
            }
        ));
        assert_eq!(wallet.balance, Balance::new(dec!(1000.00)));
        assert_eq!(wallet.daily_spent, Balance::ZERO);

        let change = wallet
            .debit_within_limits(
                dec!(50.00),
                &[SpendingPeriod::Daily, SpendingPeriod::Monthly],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(change, BalanceChange::new(dec!(1000.00), dec!(950.00)));
        assert_eq!(wallet.daily_spent, Balance::new(dec!(50.00)));
        assert_eq!(wallet.monthly_spent, Balance::new(dec!(50.00)));
    }

    #[test]
    fn test_reset_spending() {
        let mut wallet = wallet_with(dec!(0));
        wallet.increment_spending(dec!(5), SpendingPeriod::Daily);
        wallet.increment_spending(dec!(5), SpendingPeriod::Monthly);
        wallet.reset_spending(SpendingPeriod::Daily);
        assert_eq!(wallet.daily_spent, Balance::ZERO);
        assert_eq!(wallet.monthly_spent, Balance::new(dec!(5)));
    }
}
