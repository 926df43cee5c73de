use crate::domain::party::{Role, UserProfile};
use crate::domain::wallet::Wallet;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct WalletRow<'a> {
    user: &'a str,
    role: Role,
    balance: Decimal,
    available: Decimal,
    pending: Decimal,
    daily_spent: Decimal,
    monthly_spent: Decimal,
}

/// Writes final wallet state as CSV:
/// `user,role,balance,available,pending,daily_spent,monthly_spent`.
pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_wallets(&mut self, wallets: &[(UserProfile, Wallet)]) -> Result<()> {
        for (profile, wallet) in wallets {
            self.writer.serialize(WalletRow {
                user: profile.user_id.as_str(),
                role: profile.role,
                balance: wallet.balance.value(),
                available: wallet.available_balance.value(),
                pending: wallet.pending_balance.value(),
                daily_spent: wallet.daily_spent.value(),
                monthly_spent: wallet.monthly_spent.value(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{UserId, WalletId};
    use crate::domain::money::Balance;
    use crate::domain::party::AccountStatus;
    use crate::domain::wallet::WalletDefaults;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_rows() {
        let now = Utc::now();
        let mut wallet = Wallet::new(
            WalletId::new("AB12CD34"),
            UserId::new("alice"),
            &WalletDefaults::default(),
            now,
        );
        wallet.balance = Balance::new(dec!(895.00));
        wallet.available_balance = Balance::new(dec!(895.00));
        wallet.daily_spent = Balance::new(dec!(105.00));
        let profile = UserProfile {
            user_id: UserId::new("alice"),
            role: Role::Consumer,
            status: AccountStatus::Active,
            wallet_id: wallet.id.clone(),
            agent_code: None,
            created_at: now,
        };

        let mut out = Vec::new();
        WalletWriter::new(&mut out)
            .write_wallets(&[(profile, wallet)])
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("user,role,balance,available,pending,daily_spent,monthly_spent")
        );
        assert_eq!(lines.next(), Some("alice,CONSUMER,895.00,895.00,0,105.00,0"));
    }
}
