use crate::domain::ports::{BankGateway, CardDetails, CardGateway, ExternalPosting, GatewayDecline};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedCard {
    pub number: String,
    pub cvv: String,
    /// `MM/YY`
    pub expiry: String,
    #[serde(default = "default_card_type")]
    pub card_type: String,
}

fn default_card_type() -> String {
    "DEBIT".to_string()
}

/// Seed data for one account at the simulated bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedAccount {
    pub account_number: String,
    pub holder_name: String,
    pub bank_name: String,
    pub balance: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
    pub card: Option<SimulatedCard>,
}

fn default_active() -> bool {
    true
}

/// In-process stand-in for the card network and partner banks.
///
/// Card charges are verified the way an issuer would: card known, account
/// active, CVV and expiry matching, card not expired, funds sufficient.
/// [`SimulatedBank::set_offline`] makes every call fail, for exercising
/// retry paths.
#[derive(Clone, Default)]
pub struct SimulatedBank {
    accounts: Arc<Mutex<HashMap<String, SimulatedAccount>>>,
    offline: Arc<AtomicBool>,
    references: Arc<AtomicU64>,
}

impl SimulatedBank {
    pub fn new(accounts: Vec<SimulatedAccount>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.account_number.clone(), account))
            .collect();
        Self {
            accounts: Arc::new(Mutex::new(accounts)),
            offline: Arc::new(AtomicBool::new(false)),
            references: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn balance_of(&self, account_number: &str) -> Option<Decimal> {
        self.accounts
            .lock()
            .await
            .get(account_number)
            .map(|account| account.balance)
    }

    fn check_online(&self) -> Result<(), GatewayDecline> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayDecline::new("Bank network unavailable"))
        } else {
            Ok(())
        }
    }

    fn next_reference(&self) -> String {
        let n = self.references.fetch_add(1, Ordering::SeqCst) + 1;
        format!("BNK-{:010}", n)
    }

    fn posting(&self, account: &SimulatedAccount, old_balance: Decimal) -> ExternalPosting {
        ExternalPosting {
            reference: self.next_reference(),
            old_balance,
            new_balance: account.balance,
            bank_name: account.bank_name.clone(),
            account_holder: account.holder_name.clone(),
            card_type: account.card.as_ref().map(|c| c.card_type.clone()),
        }
    }
}

fn verify_card(account: &SimulatedAccount, card: &CardDetails) -> Result<(), GatewayDecline> {
    if !account.active {
        return Err(GatewayDecline::new(
            "Account associated with this card is not active",
        ));
    }
    let issued = account
        .card
        .as_ref()
        .ok_or_else(|| GatewayDecline::new("Invalid card details"))?;
    if issued.cvv != card.cvv {
        return Err(GatewayDecline::new("Invalid CVV"));
    }
    let (month, year) = issued
        .expiry
        .split_once('/')
        .and_then(|(m, y)| Some((m.parse::<u32>().ok()?, y.parse::<u32>().ok()?)))
        .ok_or_else(|| GatewayDecline::new("Invalid card expiry date"))?;
    if month != card.expiry_month || year != card.expiry_year {
        return Err(GatewayDecline::new("Invalid card expiry date"));
    }
    let today = Utc::now();
    let (current_year, current_month) = (today.year() as u32 % 100, today.month());
    if year < current_year || (year == current_year && month < current_month) {
        return Err(GatewayDecline::new("Card has expired"));
    }
    Ok(())
}

#[async_trait]
impl CardGateway for SimulatedBank {
    async fn charge_card(
        &self,
        card: &CardDetails,
        amount: Decimal,
    ) -> Result<ExternalPosting, GatewayDecline> {
        self.check_online()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .values_mut()
            .find(|a| a.card.as_ref().is_some_and(|c| c.number == card.number))
            .ok_or_else(|| GatewayDecline::new("Invalid card details"))?;
        verify_card(account, card)?;
        if account.balance < amount {
            return Err(GatewayDecline::new(format!(
                "Insufficient balance in bank account. Available: {}, Required: {}",
                account.balance, amount
            )));
        }
        let old_balance = account.balance;
        account.balance -= amount;
        let account = account.clone();
        Ok(self.posting(&account, old_balance))
    }
}

#[async_trait]
impl BankGateway for SimulatedBank {
    async fn credit_account(
        &self,
        account_number: &str,
        amount: Decimal,
    ) -> Result<ExternalPosting, GatewayDecline> {
        self.check_online()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(account_number)
            .ok_or_else(|| GatewayDecline::new("Bank account not found"))?;
        if !account.active {
            return Err(GatewayDecline::new("Bank account is not active"));
        }
        let old_balance = account.balance;
        account.balance += amount;
        let account = account.clone();
        Ok(self.posting(&account, old_balance))
    }

    async fn debit_account(
        &self,
        account_number: &str,
        amount: Decimal,
    ) -> Result<ExternalPosting, GatewayDecline> {
        self.check_online()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(account_number)
            .ok_or_else(|| GatewayDecline::new("Bank account not found"))?;
        if !account.active {
            return Err(GatewayDecline::new("Bank account is not active"));
        }
        if account.balance < amount {
            return Err(GatewayDecline::new("Insufficient balance in bank account"));
        }
        let old_balance = account.balance;
        account.balance -= amount;
        let account = account.clone();
        Ok(self.posting(&account, old_balance))
    }
}
