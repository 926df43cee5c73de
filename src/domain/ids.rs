use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a platform user, issued by the onboarding collaborator.
    UserId
);
string_id!(
    /// Storage identity of a wallet (8 characters, `[A-Z0-9]`).
    WalletId
);
string_id!(
    /// Human-readable transaction id, `TXN-YYYYMMDD-NNNNNN`.
    TransactionId
);
string_id!(BillerId);
string_id!(
    /// Public code an agent is addressed by (e.g. `AG001`).
    AgentCode
);

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

impl WalletId {
    pub fn generate() -> Self {
        Self(random_code(8))
    }
}

impl TransactionId {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let serial: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("TXN-{}-{:06}", at.format("%Y%m%d"), serial))
    }
}

/// Bill payment receipt number, `RCP-YYYYMM-NNNNN`.
pub fn receipt_number(at: DateTime<Utc>) -> String {
    let serial: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("RCP-{}-{:05}", at.format("%Y%m"), serial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transaction_id_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        let id = TransactionId::generate(at);
        let s = id.as_str();
        assert!(s.starts_with("TXN-20260307-"));
        assert_eq!(s.len(), "TXN-20260307-".len() + 6);
        assert!(s[13..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_wallet_id_alphabet() {
        let id = WalletId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_receipt_number_format() {
        let at = Utc.with_ymd_and_hms(2026, 11, 30, 0, 0, 0).unwrap();
        let receipt = receipt_number(at);
        assert!(receipt.starts_with("RCP-202611-"));
        assert_eq!(receipt.len(), "RCP-202611-".len() + 5);
    }
}
