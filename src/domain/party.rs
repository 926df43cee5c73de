use super::ids::{AgentCode, BillerId, UserId, WalletId};
use super::money::Balance;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Consumer,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consumer => "CONSUMER",
            Role::Agent => "AGENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Pending,
    Suspended,
}

impl AccountStatus {
    pub fn is_active(&self) -> bool {
        *self == AccountStatus::Active
    }
}

/// Identity facts the engine needs about a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub role: Role,
    pub status: AccountStatus,
    pub wallet_id: WalletId,
    pub agent_code: Option<AgentCode>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(LedgerError::InactiveAccount(format!("User {}", self.user_id)))
        }
    }
}

/// A cash-out counter operated by an agent user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub code: AgentCode,
    pub user_id: UserId,
    pub business_name: String,
    pub business_address: Option<String>,
    pub status: AccountStatus,
    pub total_cashouts: u64,
    pub total_commission_earned: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(LedgerError::InactiveAccount(format!("Agent {}", self.code)))
        }
    }

    pub fn record_cashout(&mut self, commission: Decimal) {
        self.total_cashouts += 1;
        self.total_commission_earned += commission;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillerStatus {
    Active,
    Inactive,
}

/// A utility or merchant accepting bill payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biller {
    pub id: BillerId,
    pub code: String,
    pub name: String,
    pub bill_type: String,
    pub status: BillerStatus,
    pub balance: Balance,
    pub total_payments: u64,
    pub created_at: DateTime<Utc>,
}

impl Biller {
    pub fn ensure_accepting(&self) -> Result<(), LedgerError> {
        match self.status {
            BillerStatus::Active => Ok(()),
            BillerStatus::Inactive => Err(LedgerError::ValidationError(format!(
                "Biller {} is not accepting payments",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_agent_record_cashout() {
        let mut agent = Agent {
            code: AgentCode::new("AG001"),
            user_id: UserId::new("agent-1"),
            business_name: "Corner Shop".into(),
            business_address: None,
            status: AccountStatus::Active,
            total_cashouts: 0,
            total_commission_earned: Decimal::ZERO,
            created_at: Utc::now(),
        };
        agent.record_cashout(dec!(3.00));
        agent.record_cashout(dec!(1.50));
        assert_eq!(agent.total_cashouts, 2);
        assert_eq!(agent.total_commission_earned, dec!(4.50));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&AccountStatus::Suspended).unwrap(),
            "\"SUSPENDED\""
        );
        assert!(!AccountStatus::Pending.is_active());
    }
}
