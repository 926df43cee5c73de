use crate::application::engine::EngineSettings;
use crate::domain::wallet::WalletDefaults;
use crate::error::{LedgerError, Result};
use crate::infrastructure::simulated_bank::SimulatedAccount;
use chrono::TimeDelta;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One year.
const MAX_CASH_OUT_TTL_MINUTES: i64 = 365 * 24 * 60;
/// One day.
const MAX_OUTBOX_LEASE_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// `hourly`, `daily` or `never`.
    pub rotation: String,
    pub log_to_file: bool,
    pub reserve: ReserveConfig,
    /// Rate overrides keyed by rate name, e.g. `send_money_fee: "5.00"`.
    pub rates: HashMap<String, String>,
    pub wallet_defaults: WalletDefaults,
    pub cash_out_ttl_minutes: i64,
    pub outbox_max_attempts: u32,
    pub outbox_lease_seconds: i64,
    pub bank_accounts: Vec<SimulatedAccount>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReserveConfig {
    pub opening_balance: Decimal,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            opening_balance: dec!(1000000.00),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "wallet-ledger.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            log_to_file: false,
            reserve: ReserveConfig::default(),
            rates: HashMap::new(),
            wallet_defaults: WalletDefaults::default(),
            cash_out_ttl_minutes: 24 * 60,
            outbox_max_attempts: 5,
            outbox_lease_seconds: 300,
            bank_accounts: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a YAML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content).map_err(|e| {
            LedgerError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_CASH_OUT_TTL_MINUTES).contains(&self.cash_out_ttl_minutes) {
            return Err(LedgerError::ConfigError(format!(
                "cash_out_ttl_minutes must be between 1 and {}",
                MAX_CASH_OUT_TTL_MINUTES
            )));
        }
        if !(1..=MAX_OUTBOX_LEASE_SECONDS).contains(&self.outbox_lease_seconds) {
            return Err(LedgerError::ConfigError(format!(
                "outbox_lease_seconds must be between 1 and {}",
                MAX_OUTBOX_LEASE_SECONDS
            )));
        }
        if self.outbox_max_attempts == 0 {
            return Err(LedgerError::ConfigError(
                "outbox_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.reserve.opening_balance.is_sign_negative() {
            return Err(LedgerError::ConfigError(
                "reserve.opening_balance cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let cash_out_ttl = TimeDelta::try_minutes(self.cash_out_ttl_minutes).ok_or_else(|| {
            LedgerError::ConfigError("cash_out_ttl_minutes is out of range".to_string())
        })?;
        let outbox_lease = TimeDelta::try_seconds(self.outbox_lease_seconds).ok_or_else(|| {
            LedgerError::ConfigError("outbox_lease_seconds is out of range".to_string())
        })?;
        Ok(EngineSettings {
            wallet_defaults: self.wallet_defaults.clone(),
            cash_out_ttl,
            outbox_max_attempts: self.outbox_max_attempts,
            outbox_lease,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
log_level: "debug"
rates:
  send_money_fee: "3.50"
wallet_defaults:
  currency: "BDT"
  daily_limit: 1000
  monthly_limit: 5000
bank_accounts:
  - account_number: "1234567890"
    holder_name: "Rahim Uddin"
    bank_name: "Sonali Bank"
    balance: 25000
    card:
      number: "4111111111111111"
      cvv: "123"
      expiry: "12/30"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.rates.get("send_money_fee").unwrap(), "3.50");
        assert_eq!(config.wallet_defaults.daily_limit, dec!(1000));
        assert_eq!(config.outbox_max_attempts, 5);
        assert_eq!(config.reserve.opening_balance, dec!(1000000.00));
        assert_eq!(config.bank_accounts.len(), 1);
        assert!(config.bank_accounts[0].active);
        assert_eq!(config.bank_accounts[0].card.as_ref().unwrap().card_type, "DEBIT");

        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.cash_out_ttl, TimeDelta::hours(24));
        assert_eq!(settings.outbox_lease, TimeDelta::minutes(5));
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "outbox_max_attempts: 0").unwrap();
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(LedgerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_bounds_durations() {
        for line in [
            "cash_out_ttl_minutes: 0",
            "cash_out_ttl_minutes: 9223372036854775807",
            "cash_out_ttl_minutes: 525601",
            "outbox_lease_seconds: 0",
            "outbox_lease_seconds: 86401",
        ] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "{}", line).unwrap();
            assert!(
                matches!(AppConfig::load(file.path()), Err(LedgerError::ConfigError(_))),
                "{} should be rejected",
                line
            );
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cash_out_ttl_minutes: 525600").unwrap();
        let settings = AppConfig::load(file.path()).unwrap().engine_settings().unwrap();
        assert_eq!(settings.cash_out_ttl, TimeDelta::days(365));
    }

    #[test]
    fn test_load_reports_unparsable_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reserve: [not, a, map]").unwrap();
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(LedgerError::ConfigError(_))
        ));
    }
}
