use super::ids::{BillerId, TransactionId, WalletId};
use super::money::BalanceChange;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Debit,
    Credit,
}

/// Clearing accounts standing in for money outside the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalAccount {
    /// Card schemes funds are pulled from on add-money.
    CardNetwork,
    /// Banks funds are pushed to on bank transfer.
    BankNetwork,
    /// Physical cash handed out over agent counters.
    AgentSettlement,
    /// Fees collected while the reserve could not be credited.
    FeeSuspense,
}

impl ExternalAccount {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalAccount::CardNetwork => "CARD_NETWORK",
            ExternalAccount::BankNetwork => "BANK_NETWORK",
            ExternalAccount::AgentSettlement => "AGENT_SETTLEMENT",
            ExternalAccount::FeeSuspense => "FEE_SUSPENSE",
        }
    }
}

/// The account side of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LedgerAccount {
    Wallet(WalletId),
    Reserve,
    Biller(BillerId),
    External(ExternalAccount),
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerAccount::Wallet(id) => write!(f, "wallet:{}", id),
            LedgerAccount::Reserve => f.write_str("reserve"),
            LedgerAccount::Biller(id) => write!(f, "biller:{}", id),
            LedgerAccount::External(account) => write!(f, "external:{}", account.as_str()),
        }
    }
}

/// Running balance of an external clearing account. May go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBalance {
    pub account: ExternalAccount,
    pub balance: Decimal,
}

/// Immutable double-entry record. Never updated or deleted once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub sequence: u32,
    pub account: LedgerAccount,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: TransactionId,
        sequence: u32,
        account: LedgerAccount,
        entry_type: EntryType,
        amount: Decimal,
        change: BalanceChange,
        description: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            sequence,
            account,
            entry_type,
            amount,
            balance_before: change.before,
            balance_after: change.after,
            description,
            created_at: at,
        }
    }
}

/// Σdebits and Σcredits of a set of entries.
pub fn totals(entries: &[LedgerEntry]) -> (Decimal, Decimal) {
    entries
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(debits, credits), entry| {
            match entry.entry_type {
                EntryType::Debit => (debits + entry.amount, credits),
                EntryType::Credit => (debits, credits + entry.amount),
            }
        })
}

/// True when debits and credits match exactly.
pub fn is_balanced(entries: &[LedgerEntry]) -> bool {
    let (debits, credits) = totals(entries);
    debits == credits
}
