//! Two-phase cash-out.
//!
//! Phase one (consumer) prices the request and records it as PENDING without
//! moving funds. Phase two (the assigned agent, after handing over cash) moves
//! everything at once: consumer debit, commission from the reserve to the
//! agent, agent statistics and the COMMISSION record. Any failure in phase two
//! leaves the request PENDING and nothing moved.

use crate::application::engine::WalletEngine;
use crate::application::receipt::Receipt;
use crate::domain::ids::{AgentCode, TransactionId, UserId};
use crate::domain::ledger::{EntryType, ExternalAccount};
use crate::domain::money::Amount;
use crate::domain::records::{AgentCashout, CashoutStatus};
use crate::domain::reserve::{ReserveMemo, ReserveTransactionType};
use crate::domain::transaction::{
    Metadata, NewTransaction, Transaction, TransactionStatus, TransactionType,
};
use crate::domain::wallet::SpendingPeriod;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

const BOTH_PERIODS: [SpendingPeriod; 2] = [SpendingPeriod::Daily, SpendingPeriod::Monthly];

#[derive(Debug, Clone, Deserialize)]
pub struct CashOutRequest {
    pub user_id: UserId,
    pub agent_code: AgentCode,
    pub amount: Decimal,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

impl WalletEngine {
    /// Phase one: validate, price and record a PENDING cash-out.
    pub async fn initiate_cash_out(&self, request: CashOutRequest) -> Result<Receipt> {
        let amount = Amount::new(request.amount)?.value();
        let rates = self.rate_card().await;
        let fee = rates.cash_out_fee(amount);
        let commission = rates.agent_commission(amount);
        let total = amount + fee;

        let mut uow = self.store().begin().await;
        if let Some(tx) = uow
            .find_replay(&request.user_id, request.idempotency_key.as_deref())
            .await?
        {
            let cashout: AgentCashout = uow.fetch("Cash-out", tx.id.as_str()).await?;
            let mut receipt = uow.replay_receipt(&tx).await?;
            receipt.commission = Some(cashout.commission);
            return Ok(receipt);
        }

        let agent = uow.agent(&request.agent_code).await?;
        agent.ensure_active()?;
        let user = uow.user(&request.user_id).await?;
        user.ensure_active()?;
        if agent.user_id == user.user_id {
            return Err(LedgerError::ValidationError(
                "Agents cannot cash out through their own counter".to_string(),
            ));
        }
        let agent_user = uow.user(&agent.user_id).await?;

        let wallet = uow.wallet(&user.wallet_id).await?;
        wallet.ensure_available(total)?;
        wallet.ensure_within_limits(total, &BOTH_PERIODS)?;

        let mut metadata = Metadata::new();
        metadata.insert("agent_code".into(), json!(agent.code));
        metadata.insert("fee_rate".into(), json!(rates.cash_out_fee_percentage));
        metadata.insert("commission_rate".into(), json!(rates.agent_commission_rate));
        metadata.insert("commission".into(), json!(commission));
        if let Some(location) = &request.location {
            metadata.insert("location".into(), json!(location));
        }

        let tx = uow
            .open_transaction(
                TransactionType::CashOut,
                &user.user_id,
                NewTransaction {
                    sender_id: Some(user.user_id.clone()),
                    receiver_id: Some(agent.user_id.clone()),
                    sender_wallet_id: Some(user.wallet_id.clone()),
                    receiver_wallet_id: Some(agent_user.wallet_id.clone()),
                    amount,
                    fee,
                    description: Some(format!("Cash out via agent {}", agent.code)),
                    metadata,
                    idempotency_key: request.idempotency_key.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let now = Utc::now();
        uow.put(&AgentCashout {
            transaction_id: tx.id.clone(),
            agent_code: agent.code.clone(),
            requester_id: user.user_id.clone(),
            amount,
            fee,
            commission,
            fee_rate: rates.cash_out_fee_percentage,
            commission_rate: rates.agent_commission_rate,
            status: CashoutStatus::Pending,
            location: request.location,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        })?;
        uow.commit().await?;

        info!(
            transaction_id = %tx.id,
            user_id = %user.user_id,
            agent_code = %agent.code,
            %amount,
            %fee,
            %commission,
            "cash-out initiated"
        );
        let mut receipt = Receipt::new(&tx).with_balance(&wallet);
        receipt.commission = Some(commission);
        Ok(receipt)
    }

    /// Phase two: the assigned agent confirms the cash was handed over.
    pub async fn complete_cash_out(
        &self,
        agent_user_id: &UserId,
        transaction_id: &TransactionId,
    ) -> Result<Receipt> {
        let mut uow = self.store().begin().await;
        let agent_user = uow.user(agent_user_id).await?;
        let code = agent_user.agent_code.clone().ok_or_else(|| {
            LedgerError::Forbidden(format!("User {} has no agent profile", agent_user_id))
        })?;
        let mut agent = uow.agent(&code).await?;
        agent.ensure_active()?;

        let mut tx = uow.transaction(transaction_id).await?;
        if tx.kind != TransactionType::CashOut {
            return Err(LedgerError::ValidationError(format!(
                "Transaction {} is not a cash-out",
                tx.id
            )));
        }
        let mut cashout: AgentCashout = uow.fetch("Cash-out", transaction_id.as_str()).await?;
        if cashout.agent_code != agent.code || tx.receiver_id.as_ref() != Some(agent_user_id) {
            return Err(LedgerError::Forbidden(format!(
                "Cash-out {} is not assigned to agent {}",
                tx.id, agent.code
            )));
        }
        if tx.status != TransactionStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                id: tx.id.to_string(),
                from: tx.status.as_str(),
                to: TransactionStatus::Completed.as_str(),
            });
        }
        let consumer_wallet_id = tx.sender_wallet_id.clone().ok_or_else(|| {
            LedgerError::StorageError(format!("Cash-out {} has no sender wallet", tx.id))
        })?;
        let consumer = uow.user(&cashout.requester_id).await?;
        consumer.ensure_active()?;

        uow.mark_processing(&mut tx)?;
        cashout.status = CashoutStatus::Processing;

        let total = tx.total_amount;
        let commission = cashout.commission;
        uow.post_wallet_debit(&tx.id, &consumer_wallet_id, total, &BOTH_PERIODS, "Cash out")
            .await?;
        uow.post_external(
            &tx.id,
            ExternalAccount::AgentSettlement,
            EntryType::Credit,
            total,
            "Cash disbursed by agent",
        )
        .await?;

        let mut commission_tx = None;
        if commission > Decimal::ZERO {
            uow.post_reserve_debit(
                &tx.id,
                commission,
                ReserveTransactionType::CommissionPaid,
                ReserveMemo::new("Agent cash-out commission")
                    .for_user(agent_user_id)
                    .for_agent(&agent.code),
            )
            .await?;
            uow.post_wallet_credit(&tx.id, &agent_user.wallet_id, commission, "Cash-out commission")
                .await?;

            let mut record = uow
                .open_transaction(
                    TransactionType::Commission,
                    agent_user_id,
                    NewTransaction {
                        receiver_id: Some(agent_user_id.clone()),
                        receiver_wallet_id: Some(agent_user.wallet_id.clone()),
                        amount: commission,
                        description: Some(format!("Commission for cash-out {}", tx.id)),
                        reference_number: Some(tx.id.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            uow.mark_completed(&mut record)?;
            commission_tx = Some(record.id);
        }

        agent.record_cashout(commission);
        uow.put(&agent)?;

        uow.mark_completed(&mut tx)?;
        cashout.status = CashoutStatus::Completed;
        cashout.updated_at = Utc::now();
        uow.put(&cashout)?;

        let consumer_wallet = uow.wallet(&consumer_wallet_id).await?;
        let agent_wallet = uow.wallet(&agent_user.wallet_id).await?;
        uow.commit().await?;

        info!(
            transaction_id = %tx.id,
            agent_code = %agent.code,
            commission_transaction = ?commission_tx,
            %total,
            %commission,
            "cash-out completed"
        );
        let mut receipt = Receipt::new(&tx)
            .with_balance(&consumer_wallet)
            .with_balance(&agent_wallet);
        receipt.commission = Some(commission);
        Ok(receipt)
    }

    /// The requesting consumer withdraws a PENDING cash-out.
    pub async fn cancel_cash_out(
        &self,
        user_id: &UserId,
        transaction_id: &TransactionId,
    ) -> Result<Transaction> {
        let mut uow = self.store().begin().await;
        let mut tx = uow.transaction(transaction_id).await?;
        let mut cashout: AgentCashout = uow.fetch("Cash-out", transaction_id.as_str()).await?;
        if &cashout.requester_id != user_id {
            return Err(LedgerError::Forbidden(format!(
                "Cash-out {} was not requested by {}",
                tx.id, user_id
            )));
        }
        uow.mark_failed(&mut tx, "cancelled by requester")?;
        cashout.status = CashoutStatus::Cancelled;
        cashout.updated_at = Utc::now();
        uow.put(&cashout)?;
        uow.commit().await?;
        info!(transaction_id = %tx.id, %user_id, "cash-out cancelled");
        Ok(tx)
    }

    /// Fails every PENDING cash-out older than the configured TTL.
    pub async fn expire_stale_cash_outs(&self) -> Result<usize> {
        let ttl = self.settings().cash_out_ttl;
        let cutoff = Utc::now().checked_sub_signed(ttl).ok_or_else(|| {
            LedgerError::ConfigError(format!("cash-out TTL {} is out of range", ttl))
        })?;
        self.expire_cash_outs_before(cutoff).await
    }

    /// Fails every PENDING cash-out initiated at or before `cutoff`.
    pub async fn expire_cash_outs_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut uow = self.store().begin().await;
        let stale: Vec<AgentCashout> = uow
            .scan::<AgentCashout>("")
            .await?
            .into_iter()
            .filter(|c| c.status == CashoutStatus::Pending && c.created_at <= cutoff)
            .collect();

        let mut expired = 0;
        for mut cashout in stale {
            let mut tx = uow.transaction(&cashout.transaction_id).await?;
            if tx.status != TransactionStatus::Pending {
                continue;
            }
            uow.mark_failed(&mut tx, "expired")?;
            cashout.status = CashoutStatus::Failed;
            cashout.updated_at = Utc::now();
            uow.put(&cashout)?;
            expired += 1;
        }
        uow.commit().await?;
        if expired > 0 {
            warn!(expired, %cutoff, "expired stale cash-out requests");
        }
        Ok(expired)
    }
}
