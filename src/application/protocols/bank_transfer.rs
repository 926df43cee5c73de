use crate::application::engine::WalletEngine;
use crate::application::receipt::Receipt;
use crate::domain::ids::UserId;
use crate::domain::ledger::{EntryType, ExternalAccount};
use crate::domain::money::Amount;
use crate::application::outbox::external_leg_status;
use crate::domain::records::{BankTransfer, ExternalLegStatus, OutboxMessage, SideEffect};
use crate::domain::reserve::ReserveMemo;
use crate::domain::transaction::{Metadata, NewTransaction, TransactionType};
use crate::domain::wallet::SpendingPeriod;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct BankTransferRequest {
    pub user_id: UserId,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub routing_number: Option<String>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl WalletEngine {
    /// Moves wallet funds to an external bank account.
    ///
    /// The wallet debit, the fee and the outbox message commit together. The
    /// bank credit is then attempted once; a failed delivery stays in the
    /// outbox for [`WalletEngine::relay_outbox`] and never rolls back the debit.
    pub async fn bank_transfer(&self, request: BankTransferRequest) -> Result<Receipt> {
        let amount = Amount::new(request.amount)?.value();
        if request.account_number.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Destination account number is required".to_string(),
            ));
        }
        let rates = self.rate_card().await;

        let mut uow = self.store().begin().await;
        if let Some(tx) = uow
            .find_replay(&request.user_id, request.idempotency_key.as_deref())
            .await?
        {
            let transfer: BankTransfer = uow.fetch("Bank transfer", tx.id.as_str()).await?;
            let mut receipt = uow.replay_receipt(&tx).await?;
            receipt.external_status = Some(transfer.status);
            return Ok(receipt);
        }

        let user = uow.user(&request.user_id).await?;
        user.ensure_active()?;
        let fee = rates.bank_transfer_fee(amount, user.role);
        let total = amount + fee;
        let periods = [SpendingPeriod::Daily, SpendingPeriod::Monthly];

        let wallet = uow.wallet(&user.wallet_id).await?;
        wallet.ensure_available(total)?;
        wallet.ensure_within_limits(total, &periods)?;

        let mut metadata = Metadata::new();
        metadata.insert("bank_name".into(), json!(request.bank_name));
        metadata.insert("account_holder".into(), json!(request.account_holder));
        metadata.insert("fee_rate".into(), json!(rates.bank_transfer_fee_percentage));
        metadata.insert("min_fee".into(), json!(rates.bank_transfer_min_fee));

        let mut tx = uow
            .open_transaction(
                TransactionType::BankTransfer,
                &user.user_id,
                NewTransaction {
                    sender_id: Some(user.user_id.clone()),
                    sender_wallet_id: Some(user.wallet_id.clone()),
                    amount,
                    fee,
                    description: request
                        .description
                        .clone()
                        .or_else(|| Some(format!("Transfer to {}", request.bank_name))),
                    metadata,
                    idempotency_key: request.idempotency_key.clone(),
                    ..Default::default()
                },
            )
            .await?;

        uow.post_wallet_debit(&tx.id, &user.wallet_id, total, &periods, "Bank transfer")
            .await?;
        uow.post_external(
            &tx.id,
            ExternalAccount::BankNetwork,
            EntryType::Credit,
            amount,
            "Bank transfer payout",
        )
        .await?;
        if fee > Decimal::ZERO {
            uow.collect_fee(
                &tx.id,
                fee,
                ReserveMemo::new("Bank transfer fee").for_user(&user.user_id),
            )
            .await?;
        }

        let now = Utc::now();
        uow.put(&BankTransfer {
            transaction_id: tx.id.clone(),
            user_id: user.user_id.clone(),
            bank_name: request.bank_name,
            account_name: request.account_holder,
            account_number: request.account_number.clone(),
            routing_number: request.routing_number,
            amount,
            fee,
            status: ExternalLegStatus::Pending,
            reference_number: None,
            created_at: now,
            updated_at: now,
        })?;
        let message = OutboxMessage::new(
            tx.id.clone(),
            SideEffect::BankCredit {
                account_number: request.account_number,
                amount,
            },
            now,
        );
        uow.put(&message)?;
        uow.mark_completed(&mut tx)?;
        let wallet = uow.wallet(&user.wallet_id).await?;
        uow.commit().await?;

        info!(transaction_id = %tx.id, user_id = %user.user_id, %amount, %fee, "bank transfer debited");

        let external_status = match self.deliver(&message.id).await {
            Ok(status) => external_leg_status(status),
            Err(e) => {
                warn!(transaction_id = %tx.id, "bank credit delivery deferred: {}", e);
                ExternalLegStatus::Processing
            }
        };
        let mut receipt = Receipt::new(&tx).with_balance(&wallet);
        receipt.external_status = Some(external_status);
        Ok(receipt)
    }
}
