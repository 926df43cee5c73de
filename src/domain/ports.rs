use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Logical tables the engine persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Users,
    Agents,
    Billers,
    Wallets,
    Transactions,
    Ledger,
    ExternalAccounts,
    Cashouts,
    BankTransfers,
    BillPayments,
    Outbox,
    Idempotency,
    Reserve,
    ReserveLog,
}

impl Table {
    pub const ALL: [Table; 14] = [
        Table::Users,
        Table::Agents,
        Table::Billers,
        Table::Wallets,
        Table::Transactions,
        Table::Ledger,
        Table::ExternalAccounts,
        Table::Cashouts,
        Table::BankTransfers,
        Table::BillPayments,
        Table::Outbox,
        Table::Idempotency,
        Table::Reserve,
        Table::ReserveLog,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Agents => "agents",
            Table::Billers => "billers",
            Table::Wallets => "wallets",
            Table::Transactions => "transactions",
            Table::Ledger => "ledger",
            Table::ExternalAccounts => "external_accounts",
            Table::Cashouts => "cashouts",
            Table::BankTransfers => "bank_transfers",
            Table::BillPayments => "bill_payments",
            Table::Outbox => "outbox",
            Table::Idempotency => "idempotency",
            Table::Reserve => "reserve",
            Table::ReserveLog => "reserve_log",
        }
    }

    /// Tables guarded by the reserve row lock instead of the ledger lock.
    pub fn is_reserve(&self) -> bool {
        matches!(self, Table::Reserve | Table::ReserveLog)
    }
}

/// One staged write: table, key, serialized record.
pub type WriteOp = (Table, String, Vec<u8>);

/// Ordered key/value storage.
///
/// Implementations must apply a `write` batch atomically and return
/// `scan_prefix` results ordered by key.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>>;
    async fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
    async fn write(&self, batch: Vec<WriteOp>) -> Result<()>;
}

pub type StorageBackendBox = Box<dyn StorageBackend>;

/// Runtime-adjustable configuration values keyed by name.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn rate(&self, key: &str) -> Option<String>;
}

pub type RateSourceBox = Box<dyn RateSource>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub cvv: String,
    pub expiry_month: u32,
    /// Two-digit year, as printed on the card.
    pub expiry_year: u32,
    pub holder_name: Option<String>,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        let len = self.number.len();
        self.number.get(len.saturating_sub(4)..).unwrap_or_default()
    }
}

/// What an external system reports after moving money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPosting {
    pub reference: String,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    pub bank_name: String,
    pub account_holder: String,
    pub card_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayDecline {
    pub message: String,
}

impl GatewayDecline {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ExternalPosting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.reference, self.old_balance, self.new_balance)
    }
}

#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn charge_card(
        &self,
        card: &CardDetails,
        amount: Decimal,
    ) -> std::result::Result<ExternalPosting, GatewayDecline>;
}

pub type CardGatewayBox = Box<dyn CardGateway>;

#[async_trait]
pub trait BankGateway: Send + Sync {
    async fn credit_account(
        &self,
        account_number: &str,
        amount: Decimal,
    ) -> std::result::Result<ExternalPosting, GatewayDecline>;

    async fn debit_account(
        &self,
        account_number: &str,
        amount: Decimal,
    ) -> std::result::Result<ExternalPosting, GatewayDecline>;
}

pub type BankGatewayBox = Box<dyn BankGateway>;
