use super::store::Store;
use crate::domain::fees::RateCard;
use crate::domain::ids::{AgentCode, BillerId, TransactionId, UserId};
use crate::domain::ledger::LedgerEntry;
use crate::domain::party::{Agent, Biller, UserProfile};
use crate::domain::ports::{BankGatewayBox, CardGatewayBox, RateSourceBox, StorageBackendBox};
use crate::domain::records::{AgentCashout, BankTransfer, BillPayment, OutboxMessage};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::{SpendingPeriod, Wallet, WalletDefaults};
use crate::error::Result;
use chrono::TimeDelta;
use tracing::info;

/// Tunables that are not rates.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub wallet_defaults: WalletDefaults,
    /// Age after which a PENDING cash-out is expired.
    pub cash_out_ttl: TimeDelta,
    /// Delivery attempts before an outbox message is dead-lettered.
    pub outbox_max_attempts: u32,
    /// How long an IN_FLIGHT claim blocks other relays.
    pub outbox_lease: TimeDelta,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            wallet_defaults: WalletDefaults::default(),
            cash_out_ttl: TimeDelta::minutes(24 * 60),
            outbox_max_attempts: 5,
            outbox_lease: TimeDelta::minutes(5),
        }
    }
}

/// The wallet engine.
///
/// `WalletEngine` owns the store and the external collaborators and exposes
/// every protocol as an async method taking `&self`, so one engine can be
/// shared across tasks (`Arc<WalletEngine>`). Each protocol runs its state
/// changes inside one unit of work; external calls happen outside of it.
pub struct WalletEngine {
    store: Store,
    rates: RateSourceBox,
    cards: CardGatewayBox,
    banks: BankGatewayBox,
    settings: EngineSettings,
}

impl WalletEngine {
    /// Creates a new `WalletEngine`.
    ///
    /// # Arguments
    ///
    /// * `backend` - Storage for every table.
    /// * `rates` - Source of fee and commission rates, read per request.
    /// * `cards` - Card network used by add-money.
    /// * `banks` - Partner banks credited by bank transfers.
    /// * `settings` - Wallet defaults, cash-out expiry, outbox retry budget.
    pub fn new(
        backend: StorageBackendBox,
        rates: RateSourceBox,
        cards: CardGatewayBox,
        banks: BankGatewayBox,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store: Store::new(backend),
            rates,
            cards,
            banks,
            settings,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn cards(&self) -> &CardGatewayBox {
        &self.cards
    }

    pub(crate) fn banks(&self) -> &BankGatewayBox {
        &self.banks
    }

    pub(crate) async fn rate_card(&self) -> RateCard {
        RateCard::fetch(self.rates.as_ref()).await
    }

    pub async fn user(&self, user_id: &UserId) -> Result<UserProfile> {
        self.store.begin().await.user(user_id).await
    }

    pub async fn wallet_of(&self, user_id: &UserId) -> Result<Wallet> {
        let uow = self.store.begin().await;
        let profile = uow.user(user_id).await?;
        uow.wallet(&profile.wallet_id).await
    }

    /// Every user with their wallet, ordered by user id.
    pub async fn wallets(&self) -> Result<Vec<(UserProfile, Wallet)>> {
        let uow = self.store.begin().await;
        let mut rows = Vec::new();
        for profile in uow.scan::<UserProfile>("").await? {
            let wallet = uow.wallet(&profile.wallet_id).await?;
            rows.push((profile, wallet));
        }
        Ok(rows)
    }

    pub async fn transaction(&self, id: &TransactionId) -> Result<Transaction> {
        self.store.begin().await.transaction(id).await
    }

    /// Transactions a user sent or received, newest first.
    pub async fn transactions_for(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        let uow = self.store.begin().await;
        let mut history: Vec<Transaction> = uow
            .scan::<Transaction>("")
            .await?
            .into_iter()
            .filter(|tx| {
                tx.sender_id.as_ref() == Some(user_id) || tx.receiver_id.as_ref() == Some(user_id)
            })
            .collect();
        history.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at));
        Ok(history)
    }

    pub async fn ledger_entries(&self, id: &TransactionId) -> Result<Vec<LedgerEntry>> {
        self.store.begin().await.entries_for(id).await
    }

    pub async fn verify_ledger(&self, id: &TransactionId) -> Result<bool> {
        self.store.begin().await.verify_balance(id).await
    }

    pub async fn cash_out_record(&self, id: &TransactionId) -> Result<AgentCashout> {
        self.store.begin().await.fetch("Cash-out", id.as_str()).await
    }

    pub async fn bank_transfer_record(&self, id: &TransactionId) -> Result<BankTransfer> {
        self.store
            .begin()
            .await
            .fetch("Bank transfer", id.as_str())
            .await
    }

    pub async fn bill_payment_record(&self, id: &TransactionId) -> Result<BillPayment> {
        self.store
            .begin()
            .await
            .fetch("Bill payment", id.as_str())
            .await
    }

    /// Outbox messages recorded by one transaction, in key order.
    pub async fn outbox_messages(&self, id: &TransactionId) -> Result<Vec<OutboxMessage>> {
        self.store
            .begin()
            .await
            .scan(&format!("{}:", id))
            .await
    }

    pub async fn agent(&self, code: &AgentCode) -> Result<Agent> {
        self.store.begin().await.agent(code).await
    }

    pub async fn biller(&self, id: &BillerId) -> Result<Biller> {
        self.store.begin().await.biller(id).await
    }

    /// Zeroes one spending counter on every wallet. Called by the scheduler
    /// at day and month boundaries.
    pub async fn reset_spending(&self, period: SpendingPeriod) -> Result<usize> {
        let mut uow = self.store.begin().await;
        let wallets = uow.scan::<Wallet>("").await?;
        let count = wallets.len();
        for mut wallet in wallets {
            wallet.reset_spending(period);
            uow.put(&wallet)?;
        }
        uow.commit().await?;
        info!(%period, wallets = count, "spending counters reset");
        Ok(count)
    }
}
