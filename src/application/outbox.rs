//! Delivery of side effects recorded in the outbox.
//!
//! A message is claimed (IN_FLIGHT) in its own unit of work before the
//! external call, so two relays never deliver the same message. The external
//! call runs with no lock held; its outcome is recorded in a second unit of
//! work. A claim whose outcome never got recorded is reclaimed once
//! [`EngineSettings::outbox_lease`](super::engine::EngineSettings) has passed.

use super::engine::WalletEngine;
use super::store::UnitOfWork;
use crate::domain::ids::TransactionId;
use crate::domain::ports::{ExternalPosting, GatewayDecline};
use crate::domain::records::{
    BankTransfer, ExternalLegStatus, OutboxMessage, OutboxStatus, SideEffect,
};
use crate::domain::reserve::ReserveMemo;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Messages whose delivery hit a local error. They stay claimable.
    pub errored: usize,
}

/// Status of a bank transfer's external leg given its outbox message.
pub fn external_leg_status(status: OutboxStatus) -> ExternalLegStatus {
    match status {
        OutboxStatus::Delivered => ExternalLegStatus::Completed,
        OutboxStatus::DeadLetter => ExternalLegStatus::Failed,
        OutboxStatus::Pending | OutboxStatus::InFlight => ExternalLegStatus::Processing,
    }
}

enum Claim {
    Claimed(OutboxMessage),
    Skipped(OutboxStatus),
}

impl WalletEngine {
    /// Attempts every PENDING message, and every IN_FLIGHT message whose
    /// claim has outlived the lease, once.
    pub async fn relay_outbox(&self) -> Result<OutboxReport> {
        let now = Utc::now();
        let lease = self.settings().outbox_lease;
        let due: Vec<String> = {
            let uow = self.store().begin().await;
            uow.scan::<OutboxMessage>("")
                .await?
                .into_iter()
                .filter(|m| m.is_claimable(now, lease))
                .map(|m| m.id)
                .collect()
        };

        let mut report = OutboxReport::default();
        for id in due {
            match self.deliver(&id).await {
                Ok(OutboxStatus::Delivered) => report.delivered += 1,
                Ok(OutboxStatus::DeadLetter) => report.dead_lettered += 1,
                Ok(OutboxStatus::Pending | OutboxStatus::InFlight) => report.retried += 1,
                Err(e) => {
                    report.errored += 1;
                    error!(message_id = %id, "outbox delivery failed: {}", e);
                }
            }
        }
        if report != OutboxReport::default() {
            info!(
                delivered = report.delivered,
                retried = report.retried,
                dead_lettered = report.dead_lettered,
                errored = report.errored,
                "outbox relayed"
            );
        }
        Ok(report)
    }

    /// Delivers one message and returns its resulting status.
    pub async fn deliver(&self, id: &str) -> Result<OutboxStatus> {
        let message = match self.claim(id).await? {
            Claim::Claimed(message) => message,
            Claim::Skipped(status) => return Ok(status),
        };
        match message.effect.clone() {
            SideEffect::BankCredit {
                account_number,
                amount,
            } => {
                let outcome = self.banks().credit_account(&account_number, amount).await;
                self.record_bank_credit(message, outcome).await
            }
            SideEffect::ReserveFee { amount, memo } => {
                self.settle_reserve_fee(message, amount, memo).await
            }
        }
    }

    async fn claim(&self, id: &str) -> Result<Claim> {
        let mut uow = self.store().begin().await;
        let mut message: OutboxMessage = uow.fetch("Outbox message", id).await?;
        let now = Utc::now();
        if !message.is_claimable(now, self.settings().outbox_lease) {
            debug!(message_id = id, status = ?message.status, "outbox message not claimable, skipping");
            return Ok(Claim::Skipped(message.status));
        }
        if message.status == OutboxStatus::InFlight {
            warn!(
                message_id = id,
                attempts = message.attempts,
                "reclaiming outbox message after lease expiry"
            );
            if message.attempts >= self.settings().outbox_max_attempts {
                self.record_failure(
                    &mut uow,
                    &mut message,
                    "delivery outcome unknown after lease expiry".to_string(),
                    now,
                )
                .await?;
                uow.commit().await?;
                return Ok(Claim::Skipped(message.status));
            }
        }
        message.status = OutboxStatus::InFlight;
        message.attempts += 1;
        message.claimed_at = Some(now);
        message.updated_at = now;
        uow.put(&message)?;
        uow.commit().await?;
        Ok(Claim::Claimed(message))
    }

    async fn record_bank_credit(
        &self,
        mut message: OutboxMessage,
        outcome: std::result::Result<ExternalPosting, GatewayDecline>,
    ) -> Result<OutboxStatus> {
        let mut uow = self.store().begin().await;
        let now = Utc::now();
        match outcome {
            Ok(posting) => {
                message.status = OutboxStatus::Delivered;
                message.last_error = None;
                message.claimed_at = None;
                message.updated_at = now;
                update_bank_transfer(
                    &mut uow,
                    &message.transaction_id,
                    ExternalLegStatus::Completed,
                    Some(posting.reference.clone()),
                    now,
                )
                .await?;
                uow.put(&message)?;
                info!(transaction_id = %message.transaction_id, reference = %posting.reference, "bank credit delivered");
            }
            Err(decline) => {
                self.record_failure(&mut uow, &mut message, decline.message, now)
                    .await?;
            }
        }
        uow.commit().await?;
        Ok(message.status)
    }

    /// Moves a suspended fee into the reserve. The credit and the DELIVERED
    /// status commit together, so a reclaimed message never credits twice.
    async fn settle_reserve_fee(
        &self,
        mut message: OutboxMessage,
        amount: Decimal,
        memo: ReserveMemo,
    ) -> Result<OutboxStatus> {
        let mut uow = self.store().begin().await;
        match uow
            .settle_suspended_fee(&message.transaction_id, amount, memo)
            .await
        {
            Ok(change) => {
                message.status = OutboxStatus::Delivered;
                message.last_error = None;
                message.claimed_at = None;
                message.updated_at = Utc::now();
                uow.put(&message)?;
                uow.commit().await?;
                info!(
                    transaction_id = %message.transaction_id,
                    %amount,
                    reserve_balance = %change.after,
                    "suspended fee credited to reserve"
                );
            }
            Err(e) => {
                drop(uow);
                let mut uow = self.store().begin().await;
                self.record_failure(&mut uow, &mut message, e.to_string(), Utc::now())
                    .await?;
                uow.commit().await?;
            }
        }
        Ok(message.status)
    }

    /// Returns a failed message to PENDING, or dead-letters it once its
    /// attempts are spent.
    async fn record_failure(
        &self,
        uow: &mut UnitOfWork,
        message: &mut OutboxMessage,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let exhausted = message.attempts >= self.settings().outbox_max_attempts;
        message.status = if exhausted {
            OutboxStatus::DeadLetter
        } else {
            OutboxStatus::Pending
        };
        message.claimed_at = None;
        message.updated_at = now;
        if exhausted {
            error!(
                message_id = %message.id,
                attempts = message.attempts,
                "{} failed permanently; reconciliation required: {}",
                message.effect.name(),
                reason
            );
        } else {
            warn!(
                message_id = %message.id,
                attempts = message.attempts,
                "{} failed, will retry: {}",
                message.effect.name(),
                reason
            );
        }
        message.last_error = Some(reason);

        if let SideEffect::BankCredit { .. } = message.effect {
            let leg = if exhausted {
                ExternalLegStatus::Failed
            } else {
                ExternalLegStatus::Processing
            };
            update_bank_transfer(uow, &message.transaction_id, leg, None, now).await?;
        }
        uow.put(&*message)
    }
}

async fn update_bank_transfer(
    uow: &mut UnitOfWork,
    transaction_id: &TransactionId,
    status: ExternalLegStatus,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(mut transfer) = uow.get::<BankTransfer>(transaction_id.as_str()).await? else {
        warn!(%transaction_id, "bank transfer record missing, outbox status recorded alone");
        return Ok(());
    };
    transfer.status = status;
    if reference.is_some() {
        transfer.reference_number = reference;
    }
    transfer.updated_at = now;
    uow.put(&transfer)
}
