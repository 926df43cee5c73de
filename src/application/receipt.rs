use crate::domain::ids::{TransactionId, UserId};
use crate::domain::records::ExternalLegStatus;
use crate::domain::transaction::{Transaction, TransactionStatus, TransactionType};
use crate::domain::wallet::Wallet;
use crate::error::{ErrorKind, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub user_id: UserId,
    pub balance: Decimal,
    pub available_balance: Decimal,
}

/// What every money-movement protocol returns on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub transaction_id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<Decimal>,
    pub balances: Vec<BalanceSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_status: Option<ExternalLegStatus>,
    pub replayed: bool,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Receipt {
    pub fn new(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            kind: tx.kind,
            status: tx.status,
            amount: tx.amount,
            fee: tx.fee,
            total_amount: tx.total_amount,
            commission: None,
            balances: Vec::new(),
            receipt_number: None,
            external_status: None,
            replayed: false,
            initiated_at: tx.initiated_at,
            completed_at: tx.completed_at,
        }
    }

    pub fn with_balance(mut self, wallet: &Wallet) -> Self {
        self.push_balance(wallet);
        self
    }

    pub fn push_balance(&mut self, wallet: &Wallet) {
        self.balances.push(BalanceSnapshot {
            user_id: wallet.user_id.clone(),
            balance: wallet.balance.value(),
            available_balance: wallet.available_balance.value(),
        });
    }

    pub fn balance_of(&self, user_id: &UserId) -> Option<Decimal> {
        self.balances
            .iter()
            .find(|snapshot| &snapshot.user_id == user_id)
            .map(|snapshot| snapshot.balance)
    }
}

/// Transport-facing envelope: failures become data, never panics.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                code: None,
                message: "OK".to_string(),
                data: Some(data),
            },
            Err(e) => Self {
                success: false,
                code: Some(e.kind()),
                message: e.to_string(),
                data: None,
            },
        }
    }
}
