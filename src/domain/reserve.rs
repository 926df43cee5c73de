use super::ids::{AgentCode, TransactionId, UserId};
use super::money::{Balance, BalanceChange};
use super::transaction::Metadata;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Absolute difference tolerated between the stored and the replayed balance.
pub const RECONCILIATION_TOLERANCE: Decimal = dec!(0.01);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReserveTransactionType {
    AddMoneyDeposit,
    FeeCollected,
    CommissionPaid,
    BonusGiven,
    CashbackGiven,
    RevenueOther,
    ExpenseOther,
    Settlement,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReserveDirection {
    Credit,
    Debit,
}

/// The platform's single operating account.
///
/// The running totals are only ever increased; `balance` is the one field
/// that moves both ways.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformReserve {
    pub balance: Balance,
    pub total_fees_collected: Balance,
    pub total_commissions_paid: Balance,
    pub total_bonuses_given: Balance,
    pub last_transaction_at: Option<DateTime<Utc>>,
    /// Id of the most recent audit row.
    pub last_entry_id: u64,
}

impl PlatformReserve {
    pub fn credit(
        &mut self,
        amount: Decimal,
        kind: ReserveTransactionType,
        at: DateTime<Utc>,
    ) -> BalanceChange {
        let before = self.balance.value();
        self.balance += Balance::new(amount);
        if kind == ReserveTransactionType::FeeCollected {
            self.total_fees_collected += Balance::new(amount);
        }
        self.last_transaction_at = Some(at);
        BalanceChange::new(before, self.balance.value())
    }

    /// Fails without mutation when the reserve cannot cover `amount`.
    pub fn debit(
        &mut self,
        amount: Decimal,
        kind: ReserveTransactionType,
        at: DateTime<Utc>,
    ) -> Result<BalanceChange, LedgerError> {
        if self.balance.value() < amount {
            return Err(LedgerError::InsufficientReserve {
                required: amount,
                available: self.balance.value(),
            });
        }
        let before = self.balance.value();
        self.balance -= Balance::new(amount);
        match kind {
            ReserveTransactionType::CommissionPaid => {
                self.total_commissions_paid += Balance::new(amount)
            }
            ReserveTransactionType::BonusGiven | ReserveTransactionType::CashbackGiven => {
                self.total_bonuses_given += Balance::new(amount)
            }
            _ => {}
        }
        self.last_transaction_at = Some(at);
        Ok(BalanceChange::new(before, self.balance.value()))
    }

    pub fn statistics(&self) -> ReserveStatistics {
        ReserveStatistics {
            balance: self.balance.value(),
            total_fees_collected: self.total_fees_collected.value(),
            total_commissions_paid: self.total_commissions_paid.value(),
            total_bonuses_given: self.total_bonuses_given.value(),
            net_revenue: self.total_fees_collected.value()
                - self.total_commissions_paid.value()
                - self.total_bonuses_given.value(),
            last_transaction_at: self.last_transaction_at,
        }
    }
}

/// Context recorded on a reserve audit row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReserveMemo {
    pub description: String,
    pub related_transaction_id: Option<TransactionId>,
    pub related_user_id: Option<UserId>,
    pub related_agent_code: Option<AgentCode>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ReserveMemo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn for_transaction(mut self, id: &TransactionId) -> Self {
        self.related_transaction_id = Some(id.clone());
        self
    }

    pub fn for_user(mut self, id: &UserId) -> Self {
        self.related_user_id = Some(id.clone());
        self
    }

    pub fn for_agent(mut self, code: &AgentCode) -> Self {
        self.related_agent_code = Some(code.clone());
        self
    }
}

/// Append-only audit row for every reserve movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveTransaction {
    pub id: u64,
    pub kind: ReserveTransactionType,
    pub direction: ReserveDirection,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub memo: ReserveMemo,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub success: bool,
    pub current_balance: Decimal,
    pub calculated_balance: Decimal,
    pub discrepancy: Decimal,
    pub message: String,
}

/// Replays the audit trail and compares it to the stored balance.
pub fn reconcile(reserve: &PlatformReserve, audit: &[ReserveTransaction]) -> ReconciliationReport {
    let calculated = audit.iter().fold(Decimal::ZERO, |acc, row| match row.direction {
        ReserveDirection::Credit => acc + row.amount,
        ReserveDirection::Debit => acc - row.amount,
    });
    let current = reserve.balance.value();
    let discrepancy = current - calculated;
    let success = discrepancy.abs() < RECONCILIATION_TOLERANCE;
    let message = if success {
        "Platform reserve is balanced".to_string()
    } else {
        format!(
            "Discrepancy of {} between stored balance {} and audit trail {}",
            discrepancy, current, calculated
        )
    };
    ReconciliationReport {
        success,
        current_balance: current,
        calculated_balance: calculated,
        discrepancy,
        message,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveStatistics {
    pub balance: Decimal,
    pub total_fees_collected: Decimal,
    pub total_commissions_paid: Decimal,
    pub total_bonuses_given: Decimal,
    pub net_revenue: Decimal,
    pub last_transaction_at: Option<DateTime<Utc>>,
}
