use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{0} is not active")]
    InactiveAccount(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },
    #[error("Insufficient platform reserve: required {required}, available {available}")]
    InsufficientReserve { required: Decimal, available: Decimal },
    #[error(
        "{period} spending limit exceeded: limit {limit}, already spent {spent}, requested {attempted}"
    )]
    LimitExceeded {
        period: &'static str,
        limit: Decimal,
        spent: Decimal,
        attempted: Decimal,
    },
    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },
    #[error("External service declined: {0}")]
    ExternalDeclined(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

/// Coarse classification used by callers that only need to branch on the
/// category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    LimitExceeded,
    ExternalDependency,
    ReserveExhausted,
    Conflict,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::ValidationError(_)
            | LedgerError::InactiveAccount(_)
            | LedgerError::NotFound { .. }
            | LedgerError::Forbidden(_) => ErrorKind::Validation,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            LedgerError::ExternalDeclined(_) => ErrorKind::ExternalDependency,
            LedgerError::InsufficientReserve { .. } => ErrorKind::ReserveExhausted,
            LedgerError::InvalidTransition { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
