use crate::application::engine::WalletEngine;
use crate::application::receipt::Receipt;
use crate::domain::ids::UserId;
use crate::domain::money::Amount;
use crate::domain::reserve::ReserveMemo;
use crate::domain::transaction::{NewTransaction, TransactionType};
use crate::domain::wallet::SpendingPeriod;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct SendMoneyRequest {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub amount: Decimal,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl WalletEngine {
    /// Peer-to-peer transfer. The sender pays `amount + fee`, the recipient
    /// receives `amount` and the fee goes to the reserve, all in one unit of work.
    /// A fee the reserve cannot take is suspended and does not fail the transfer.
    pub async fn send_money(&self, request: SendMoneyRequest) -> Result<Receipt> {
        let amount = Amount::new(request.amount)?.value();
        if request.sender_id == request.recipient_id {
            return Err(LedgerError::ValidationError(
                "Cannot send money to yourself".to_string(),
            ));
        }
        let fee = self.rate_card().await.send_money_fee();
        let total = amount + fee;

        let mut uow = self.store().begin().await;
        if let Some(tx) = uow
            .find_replay(&request.sender_id, request.idempotency_key.as_deref())
            .await?
        {
            return uow.replay_receipt(&tx).await;
        }

        let sender = uow.user(&request.sender_id).await?;
        sender.ensure_active()?;
        let recipient = uow.user(&request.recipient_id).await?;
        recipient.ensure_active()?;

        let sender_wallet = uow.wallet(&sender.wallet_id).await?;
        sender_wallet.ensure_available(total)?;
        sender_wallet.ensure_within_limits(total, &[SpendingPeriod::Daily])?;

        let mut tx = uow
            .open_transaction(
                TransactionType::SendMoney,
                &sender.user_id,
                NewTransaction {
                    sender_id: Some(sender.user_id.clone()),
                    receiver_id: Some(recipient.user_id.clone()),
                    sender_wallet_id: Some(sender.wallet_id.clone()),
                    receiver_wallet_id: Some(recipient.wallet_id.clone()),
                    amount,
                    fee,
                    description: request.description.clone(),
                    idempotency_key: request.idempotency_key.clone(),
                    ..Default::default()
                },
            )
            .await?;

        uow.post_wallet_debit(
            &tx.id,
            &sender.wallet_id,
            total,
            &[SpendingPeriod::Daily],
            "Send money",
        )
        .await?;
        uow.post_wallet_credit(&tx.id, &recipient.wallet_id, amount, "Receive money")
            .await?;
        if fee > Decimal::ZERO {
            uow.collect_fee(
                &tx.id,
                fee,
                ReserveMemo::new("Send money fee").for_user(&sender.user_id),
            )
            .await?;
        }
        uow.mark_completed(&mut tx)?;

        let sender_wallet = uow.wallet(&sender.wallet_id).await?;
        let recipient_wallet = uow.wallet(&recipient.wallet_id).await?;
        uow.commit().await?;

        info!(
            transaction_id = %tx.id,
            sender = %sender.user_id,
            recipient = %recipient.user_id,
            %amount,
            %fee,
            "money sent"
        );
        Ok(Receipt::new(&tx)
            .with_balance(&sender_wallet)
            .with_balance(&recipient_wallet))
    }
}
