use crate::application::engine::WalletEngine;
use crate::application::receipt::Receipt;
use crate::application::store::RESERVE_KEY;
use crate::domain::ids::{AgentCode, BillerId, UserId, WalletId};
use crate::domain::money::{Amount, Balance};
use crate::domain::party::{AccountStatus, Agent, Biller, BillerStatus, Role, UserProfile};
use crate::domain::reserve::{PlatformReserve, ReserveMemo, ReserveTransactionType};
use crate::domain::transaction::{NewTransaction, TransactionType};
use crate::domain::wallet::Wallet;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardUser {
    pub user_id: UserId,
    pub role: Role,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingReceipt {
    pub user: UserProfile,
    pub wallet: Wallet,
    /// Present when a bonus was paid.
    pub bonus: Option<Receipt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgent {
    pub user_id: UserId,
    pub agent_code: AgentCode,
    pub business_name: String,
    pub business_address: Option<String>,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBiller {
    pub biller_id: BillerId,
    pub code: String,
    pub name: String,
    pub bill_type: String,
}

impl WalletEngine {
    /// Registers a user and creates their wallet. Consumers get the onboarding
    /// bonus from the reserve; a reserve that cannot fund it does not block
    /// registration.
    pub async fn onboard_user(&self, request: OnboardUser) -> Result<OnboardingReceipt> {
        let rates = self.rate_card().await;
        let mut uow = self.store().begin().await;
        if uow.get::<UserProfile>(request.user_id.as_str()).await?.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "User {} is already registered",
                request.user_id
            )));
        }

        let now = Utc::now();
        let mut wallet_id = WalletId::generate();
        while uow.get::<Wallet>(wallet_id.as_str()).await?.is_some() {
            wallet_id = WalletId::generate();
        }
        let wallet = Wallet::new(
            wallet_id.clone(),
            request.user_id.clone(),
            &self.settings().wallet_defaults,
            now,
        );
        let user = UserProfile {
            user_id: request.user_id.clone(),
            role: request.role,
            status: request.status,
            wallet_id: wallet_id.clone(),
            agent_code: None,
            created_at: now,
        };
        uow.put(&wallet)?;
        uow.put(&user)?;

        let bonus_amount = rates.onboarding_bonus();
        let mut bonus = None;
        if request.role == Role::Consumer && bonus_amount > Decimal::ZERO {
            uow.lock_reserve().await?;
            let available = uow
                .get::<PlatformReserve>(RESERVE_KEY)
                .await?
                .map(|reserve| reserve.balance.value())
                .unwrap_or_default();
            if available < bonus_amount {
                warn!(
                    user_id = %user.user_id,
                    %bonus_amount,
                    %available,
                    "platform reserve cannot fund onboarding bonus, skipping"
                );
            } else {
                let mut tx = uow
                    .open_transaction(
                        TransactionType::OnboardingBonus,
                        &user.user_id,
                        NewTransaction {
                            receiver_id: Some(user.user_id.clone()),
                            receiver_wallet_id: Some(wallet_id.clone()),
                            amount: bonus_amount,
                            description: Some("Welcome bonus".to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                uow.post_reserve_debit(
                    &tx.id,
                    bonus_amount,
                    ReserveTransactionType::BonusGiven,
                    ReserveMemo::new("Onboarding bonus").for_user(&user.user_id),
                )
                .await?;
                uow.post_wallet_credit(&tx.id, &wallet_id, bonus_amount, "Onboarding bonus")
                    .await?;
                uow.mark_completed(&mut tx)?;
                bonus = Some(tx);
            }
        }

        let wallet = uow.wallet(&wallet_id).await?;
        uow.commit().await?;
        info!(user_id = %user.user_id, role = %user.role, wallet_id = %wallet_id, "user onboarded");
        Ok(OnboardingReceipt {
            bonus: bonus.map(|tx| Receipt::new(&tx).with_balance(&wallet)),
            user,
            wallet,
        })
    }

    pub async fn set_user_status(&self, user_id: &UserId, status: AccountStatus) -> Result<()> {
        let mut uow = self.store().begin().await;
        let mut user = uow.user(user_id).await?;
        user.status = status;
        uow.put(&user)?;
        uow.commit().await
    }

    /// Attaches an agent counter to an existing AGENT user.
    pub async fn register_agent(&self, request: RegisterAgent) -> Result<Agent> {
        let mut uow = self.store().begin().await;
        let mut user = uow.user(&request.user_id).await?;
        if user.role != Role::Agent {
            return Err(LedgerError::ValidationError(format!(
                "User {} is not an agent",
                user.user_id
            )));
        }
        if user.agent_code.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "User {} already operates an agent counter",
                user.user_id
            )));
        }
        if uow.get::<Agent>(request.agent_code.as_str()).await?.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "Agent code {} is taken",
                request.agent_code
            )));
        }
        let agent = Agent {
            code: request.agent_code.clone(),
            user_id: request.user_id,
            business_name: request.business_name,
            business_address: request.business_address,
            status: request.status,
            total_cashouts: 0,
            total_commission_earned: Decimal::ZERO,
            created_at: Utc::now(),
        };
        user.agent_code = Some(request.agent_code);
        uow.put(&agent)?;
        uow.put(&user)?;
        uow.commit().await?;
        info!(agent_code = %agent.code, user_id = %agent.user_id, "agent registered");
        Ok(agent)
    }

    pub async fn set_agent_status(&self, code: &AgentCode, status: AccountStatus) -> Result<()> {
        let mut uow = self.store().begin().await;
        let mut agent = uow.agent(code).await?;
        agent.status = status;
        uow.put(&agent)?;
        uow.commit().await
    }

    pub async fn register_biller(&self, request: RegisterBiller) -> Result<Biller> {
        let mut uow = self.store().begin().await;
        if uow.get::<Biller>(request.biller_id.as_str()).await?.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "Biller {} already exists",
                request.biller_id
            )));
        }
        let biller = Biller {
            id: request.biller_id,
            code: request.code,
            name: request.name,
            bill_type: request.bill_type,
            status: BillerStatus::Active,
            balance: Balance::ZERO,
            total_payments: 0,
            created_at: Utc::now(),
        };
        uow.put(&biller)?;
        uow.commit().await?;
        Ok(biller)
    }

    pub async fn set_biller_status(&self, id: &BillerId, status: BillerStatus) -> Result<()> {
        let mut uow = self.store().begin().await;
        let mut biller = uow.biller(id).await?;
        biller.status = status;
        uow.put(&biller)?;
        uow.commit().await
    }

    /// Reserve-funded promotional credit.
    pub async fn grant_cashback(
        &self,
        user_id: &UserId,
        amount: Decimal,
        reason: &str,
    ) -> Result<Receipt> {
        let amount = Amount::new(amount)?.value();
        let mut uow = self.store().begin().await;
        let user = uow.user(user_id).await?;
        user.ensure_active()?;

        let mut tx = uow
            .open_transaction(
                TransactionType::Cashback,
                user_id,
                NewTransaction {
                    receiver_id: Some(user_id.clone()),
                    receiver_wallet_id: Some(user.wallet_id.clone()),
                    amount,
                    description: Some(reason.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        uow.post_reserve_debit(
            &tx.id,
            amount,
            ReserveTransactionType::CashbackGiven,
            ReserveMemo::new(reason).for_user(user_id),
        )
        .await?;
        uow.post_wallet_credit(&tx.id, &user.wallet_id, amount, reason)
            .await?;
        uow.mark_completed(&mut tx)?;
        let wallet = uow.wallet(&user.wallet_id).await?;
        uow.commit().await?;

        info!(transaction_id = %tx.id, %user_id, %amount, "cashback granted");
        Ok(Receipt::new(&tx).with_balance(&wallet))
    }
}
