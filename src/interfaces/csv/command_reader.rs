use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::io::Read;

/// Operation named in the `op` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Onboard,
    Agent,
    Biller,
    Topup,
    AddMoney,
    Send,
    CashOut,
    CompleteCashOut,
    CancelCashOut,
    BankTransfer,
    PayBill,
    Cashback,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Onboard => "onboard",
            Op::Agent => "agent",
            Op::Biller => "biller",
            Op::Topup => "topup",
            Op::AddMoney => "add_money",
            Op::Send => "send",
            Op::CashOut => "cash_out",
            Op::CompleteCashOut => "complete_cash_out",
            Op::CancelCashOut => "cancel_cash_out",
            Op::BankTransfer => "bank_transfer",
            Op::PayBill => "pay_bill",
            Op::Cashback => "cashback",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the operations file: `op,user,counterparty,amount,reference`.
///
/// Empty cells read as `None`. Which columns an operation needs depends on
/// the op; the `require_*` helpers turn a missing one into a validation error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandRecord {
    pub op: Op,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl CommandRecord {
    pub fn require_user(&self) -> Result<&str> {
        if self.user.is_empty() {
            return Err(self.missing("user"));
        }
        Ok(&self.user)
    }

    pub fn require_counterparty(&self) -> Result<&str> {
        self.counterparty
            .as_deref()
            .ok_or_else(|| self.missing("counterparty"))
    }

    pub fn require_amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| self.missing("amount"))
    }

    pub fn require_reference(&self) -> Result<&str> {
        self.reference
            .as_deref()
            .ok_or_else(|| self.missing("reference"))
    }

    fn missing(&self, column: &str) -> LedgerError {
        LedgerError::ValidationError(format!("{} requires a {} column", self.op, column))
    }
}

/// Reads operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<CommandRecord>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes rows, so large files stream.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
