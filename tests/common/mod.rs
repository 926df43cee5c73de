#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use wallet_ledger::application::engine::{EngineSettings, WalletEngine};
use wallet_ledger::application::protocols::{AddMoneyRequest, OnboardUser, RegisterAgent};
use wallet_ledger::domain::fees::ONBOARDING_BONUS;
use wallet_ledger::domain::ids::{AgentCode, TransactionId, UserId};
use wallet_ledger::domain::party::{AccountStatus, Role};
use wallet_ledger::domain::ports::CardDetails;
use wallet_ledger::domain::records::OutboxMessage;
use wallet_ledger::infrastructure::in_memory::InMemoryBackend;
use wallet_ledger::infrastructure::rates::StaticRates;
use wallet_ledger::infrastructure::simulated_bank::{SimulatedAccount, SimulatedBank, SimulatedCard};

pub const CARD_ACCOUNT: &str = "1234567890";
pub const PAYOUT_ACCOUNT: &str = "9876543210";
pub const OPENING_RESERVE: Decimal = dec!(1000000.00);

/// An engine over fresh in-memory storage plus handles on its collaborators.
pub struct Harness {
    pub engine: Arc<WalletEngine>,
    pub bank: SimulatedBank,
    pub rates: StaticRates,
}

/// Default rates except for the onboarding bonus, which is off so balances
/// in scenarios start at zero.
pub async fn harness() -> Harness {
    harness_with(EngineSettings::default(), OPENING_RESERVE).await
}

pub async fn harness_with(settings: EngineSettings, opening_reserve: Decimal) -> Harness {
    let h = harness_without_reserve(settings);
    h.engine.initialize_reserve(opening_reserve).await.unwrap();
    h
}

/// Like [`harness_with`] but the platform reserve row is never created.
pub fn harness_without_reserve(settings: EngineSettings) -> Harness {
    let bank = SimulatedBank::new(vec![
        SimulatedAccount {
            account_number: CARD_ACCOUNT.into(),
            holder_name: "Rahim Uddin".into(),
            bank_name: "Sonali Bank".into(),
            balance: dec!(10000000.00),
            active: true,
            card: Some(SimulatedCard {
                number: "4111111111111111".into(),
                cvv: "123".into(),
                expiry: "12/99".into(),
                card_type: "DEBIT".into(),
            }),
        },
        SimulatedAccount {
            account_number: PAYOUT_ACCOUNT.into(),
            holder_name: "Karim Ahmed".into(),
            bank_name: "Dutch-Bangla Bank".into(),
            balance: dec!(0.00),
            active: true,
            card: None,
        },
    ]);
    let rates = StaticRates::new(HashMap::from([(
        ONBOARDING_BONUS.to_string(),
        "0".to_string(),
    )]));
    let engine = WalletEngine::new(
        Box::new(InMemoryBackend::new()),
        Box::new(rates.clone()),
        Box::new(bank.clone()),
        Box::new(bank.clone()),
        settings,
    );
    Harness {
        engine: Arc::new(engine),
        bank,
        rates,
    }
}

pub fn card() -> CardDetails {
    CardDetails {
        number: "4111111111111111".into(),
        cvv: "123".into(),
        expiry_month: 12,
        expiry_year: 99,
        holder_name: None,
    }
}

pub async fn consumer(h: &Harness, id: &str) -> UserId {
    let user_id = UserId::new(id);
    h.engine
        .onboard_user(OnboardUser {
            user_id: user_id.clone(),
            role: Role::Consumer,
            status: AccountStatus::Active,
        })
        .await
        .unwrap();
    user_id
}

pub async fn agent(h: &Harness, id: &str, code: &str) -> (UserId, AgentCode) {
    let user_id = UserId::new(id);
    h.engine
        .onboard_user(OnboardUser {
            user_id: user_id.clone(),
            role: Role::Agent,
            status: AccountStatus::Active,
        })
        .await
        .unwrap();
    let agent = h
        .engine
        .register_agent(RegisterAgent {
            user_id: user_id.clone(),
            agent_code: AgentCode::new(code),
            business_name: format!("{} Store", id),
            business_address: None,
            status: AccountStatus::Active,
        })
        .await
        .unwrap();
    (user_id, agent.code)
}

/// Tops a wallet up from the test card.
pub async fn fund(h: &Harness, user_id: &UserId, amount: Decimal) {
    h.engine
        .add_money(AddMoneyRequest {
            user_id: user_id.clone(),
            card: card(),
            amount,
            idempotency_key: None,
        })
        .await
        .unwrap();
}

pub async fn balance(h: &Harness, user_id: &UserId) -> Decimal {
    h.engine.wallet_of(user_id).await.unwrap().balance.value()
}

/// The transaction's outbox message for one effect, e.g. `bank_credit`.
pub async fn outbox_message(h: &Harness, id: &TransactionId, effect: &str) -> OutboxMessage {
    h.engine
        .outbox_messages(id)
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.effect.name() == effect)
        .unwrap()
}

/// Writes an operations file for CLI tests.
pub fn write_ops_csv(path: &Path, rows: &[[&str; 5]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["op", "user", "counterparty", "amount", "reference"])?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
