use super::money::round_money;
use super::party::Role;
use super::ports::RateSource;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

pub const SEND_MONEY_FEE: &str = "send_money_fee";
pub const CASH_OUT_FEE_PERCENTAGE: &str = "cash_out_fee_percentage";
pub const AGENT_COMMISSION_RATE: &str = "agent_commission_rate";
pub const BANK_TRANSFER_FEE_PERCENTAGE: &str = "bank_transfer_fee_percentage";
pub const BANK_TRANSFER_MIN_FEE: &str = "bank_transfer_min_fee";
pub const ONBOARDING_BONUS: &str = "onboarding_bonus";

/// Snapshot of every rate the protocols price with.
///
/// Percentages are expressed in percent (`1.85` means 1.85%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub send_money_fee: Decimal,
    pub cash_out_fee_percentage: Decimal,
    pub agent_commission_rate: Decimal,
    pub bank_transfer_fee_percentage: Decimal,
    pub bank_transfer_min_fee: Decimal,
    pub onboarding_bonus: Decimal,
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            send_money_fee: dec!(5.00),
            cash_out_fee_percentage: dec!(1.85),
            agent_commission_rate: dec!(1.5),
            bank_transfer_fee_percentage: dec!(1.5),
            bank_transfer_min_fee: dec!(10.00),
            onboarding_bonus: dec!(50.00),
        }
    }
}

impl RateCard {
    /// Reads every key from `source`, keeping the default for missing or
    /// unparsable values.
    pub async fn fetch(source: &dyn RateSource) -> Self {
        let defaults = Self::default();
        Self {
            send_money_fee: lookup(source, SEND_MONEY_FEE, defaults.send_money_fee).await,
            cash_out_fee_percentage: lookup(
                source,
                CASH_OUT_FEE_PERCENTAGE,
                defaults.cash_out_fee_percentage,
            )
            .await,
            agent_commission_rate: lookup(
                source,
                AGENT_COMMISSION_RATE,
                defaults.agent_commission_rate,
            )
            .await,
            bank_transfer_fee_percentage: lookup(
                source,
                BANK_TRANSFER_FEE_PERCENTAGE,
                defaults.bank_transfer_fee_percentage,
            )
            .await,
            bank_transfer_min_fee: lookup(
                source,
                BANK_TRANSFER_MIN_FEE,
                defaults.bank_transfer_min_fee,
            )
            .await,
            onboarding_bonus: lookup(source, ONBOARDING_BONUS, defaults.onboarding_bonus).await,
        }
    }

    pub fn send_money_fee(&self) -> Decimal {
        round_money(self.send_money_fee)
    }

    pub fn cash_out_fee(&self, amount: Decimal) -> Decimal {
        percentage_of(amount, self.cash_out_fee_percentage)
    }

    pub fn agent_commission(&self, amount: Decimal) -> Decimal {
        percentage_of(amount, self.agent_commission_rate)
    }

    /// Agents move their own float to the bank for free.
    pub fn bank_transfer_fee(&self, amount: Decimal, role: Role) -> Decimal {
        match role {
            Role::Agent => Decimal::ZERO,
            Role::Consumer => percentage_of(amount, self.bank_transfer_fee_percentage)
                .max(round_money(self.bank_transfer_min_fee)),
        }
    }

    pub fn onboarding_bonus(&self) -> Decimal {
        round_money(self.onboarding_bonus)
    }
}

/// `amount * percent / 100`, rounded to cents.
pub fn percentage_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / dec!(100))
}

async fn lookup(source: &dyn RateSource, key: &str, default: Decimal) -> Decimal {
    match source.rate(key).await {
        None => default,
        Some(raw) => match Decimal::from_str(raw.trim()) {
            Ok(value) if !value.is_sign_negative() => value,
            _ => {
                warn!(key, value = %raw, "ignoring unparsable rate, using default {}", default);
                default
            }
        },
    }
}
