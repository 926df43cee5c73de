//! Per-flow records that sit beside a transaction and track flow-specific
//! state: the cash-out handshake, the external leg of a bank transfer, the
//! biller side of a bill payment, and the outbox message driving delivery.

use super::ids::{AgentCode, BillerId, TransactionId, UserId};
use super::reserve::ReserveMemo;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCashout {
    pub transaction_id: TransactionId,
    pub agent_code: AgentCode,
    pub requester_id: UserId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub commission: Decimal,
    pub fee_rate: Decimal,
    pub commission_rate: Decimal,
    pub status: CashoutStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a leg handled outside the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalLegStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransfer {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub routing_number: Option<String>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: ExternalLegStatus,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPayment {
    pub transaction_id: TransactionId,
    pub biller_id: BillerId,
    pub user_id: UserId,
    pub account_number: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: ExternalLegStatus,
    pub billing_month: Option<String>,
    pub billing_year: Option<i32>,
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A side effect that must happen after commit, against a system we do not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    BankCredit {
        account_number: String,
        amount: Decimal,
    },
    /// A collected fee the reserve could not take when the transaction
    /// committed. It sits in fee suspense until credited.
    ReserveFee { amount: Decimal, memo: ReserveMemo },
}

impl SideEffect {
    pub fn name(&self) -> &'static str {
        match self {
            SideEffect::BankCredit { .. } => "bank_credit",
            SideEffect::ReserveFee { .. } => "reserve_fee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    Pending,
    /// Claimed by a relay; the external call may be running.
    InFlight,
    Delivered,
    /// Retries exhausted. Needs manual reconciliation.
    DeadLetter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// `{transaction_id}:{effect}`; one message per effect per transaction.
    pub id: String,
    pub transaction_id: TransactionId,
    pub effect: SideEffect,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Set while IN_FLIGHT. A claim older than the relay lease is reclaimed.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn new(transaction_id: TransactionId, effect: SideEffect, at: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(&transaction_id, &effect),
            transaction_id,
            effect,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            claimed_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn key(transaction_id: &TransactionId, effect: &SideEffect) -> String {
        format!("{}:{}", transaction_id, effect.name())
    }

    /// True if a relay may claim the message at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>, lease: TimeDelta) -> bool {
        match self.status {
            OutboxStatus::Pending => true,
            OutboxStatus::InFlight => self
                .claimed_at
                .is_none_or(|claimed| claimed + lease <= now),
            OutboxStatus::Delivered | OutboxStatus::DeadLetter => false,
        }
    }
}

/// Maps a caller-supplied idempotency key to the transaction it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub transaction_id: TransactionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn message() -> OutboxMessage {
        OutboxMessage::new(
            TransactionId::from("TXN-20260101-000001"),
            SideEffect::BankCredit {
                account_number: "1234567890".to_string(),
                amount: dec!(100),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_message_key_names_the_effect() {
        let message = message();
        assert_eq!(message.id, "TXN-20260101-000001:bank_credit");
        let fee = SideEffect::ReserveFee {
            amount: dec!(5),
            memo: ReserveMemo::new("Send money fee"),
        };
        assert_eq!(
            OutboxMessage::key(&message.transaction_id, &fee),
            "TXN-20260101-000001:reserve_fee"
        );
    }

    #[test]
    fn test_in_flight_claim_expires_after_lease() {
        let now = Utc::now();
        let lease = TimeDelta::minutes(5);
        let mut message = message();
        assert!(message.is_claimable(now, lease));

        message.status = OutboxStatus::InFlight;
        message.claimed_at = Some(now - TimeDelta::minutes(1));
        assert!(!message.is_claimable(now, lease));

        message.claimed_at = Some(now - TimeDelta::minutes(5));
        assert!(message.is_claimable(now, lease));

        message.claimed_at = None;
        assert!(message.is_claimable(now, lease));

        message.status = OutboxStatus::Delivered;
        assert!(!message.is_claimable(now, lease));
    }
}
