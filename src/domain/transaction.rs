use super::ids::{TransactionId, UserId, WalletId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form key/value context attached to transactions and reserve rows.
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    AddMoney,
    SendMoney,
    /// Cash deposited over an agent counter.
    CashIn,
    CashOut,
    BankTransfer,
    BillPayment,
    Commission,
    OnboardingBonus,
    Cashback,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::AddMoney => "ADD_MONEY",
            TransactionType::SendMoney => "SEND_MONEY",
            TransactionType::CashIn => "CASH_IN",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::BankTransfer => "BANK_TRANSFER",
            TransactionType::BillPayment => "BILL_PAYMENT",
            TransactionType::Commission => "COMMISSION",
            TransactionType::OnboardingBonus => "ONBOARDING_BONUS",
            TransactionType::Cashback => "CASHBACK",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction lifecycle states.
///
/// ```text
/// PENDING ──► PROCESSING ──► COMPLETED
///    │            │
///    ├────────────┴────────► FAILED
///    └─────────────────────► COMPLETED
/// ```
/// COMPLETED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a protocol supplies when it opens a transaction.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub sender_id: Option<UserId>,
    pub receiver_id: Option<UserId>,
    pub sender_wallet_id: Option<WalletId>,
    pub receiver_wallet_id: Option<WalletId>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub metadata: Metadata,
    pub idempotency_key: Option<String>,
}

/// One money-movement attempt and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub sender_id: Option<UserId>,
    pub receiver_id: Option<UserId>,
    pub sender_wallet_id: Option<WalletId>,
    pub receiver_wallet_id: Option<WalletId>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total_amount: Decimal,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub idempotency_key: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
}

impl Transaction {
    pub fn open(
        id: TransactionId,
        kind: TransactionType,
        new: NewTransaction,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            sender_wallet_id: new.sender_wallet_id,
            receiver_wallet_id: new.receiver_wallet_id,
            amount: new.amount,
            fee: new.fee,
            total_amount: new.amount + new.fee,
            status: TransactionStatus::Pending,
            description: new.description,
            reference_number: new.reference_number,
            metadata: new.metadata,
            idempotency_key: new.idempotency_key,
            initiated_at: at,
            completed_at: None,
            failed_reason: None,
        }
    }

    pub fn transition(&mut self, next: TransactionStatus) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.transition(TransactionStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), LedgerError> {
        self.transition(TransactionStatus::Failed)?;
        self.failed_reason = Some(reason.into());
        Ok(())
    }
}
