use crate::application::engine::WalletEngine;
use crate::application::receipt::Receipt;
use crate::domain::ids::UserId;
use crate::domain::ledger::{EntryType, ExternalAccount};
use crate::domain::money::Amount;
use crate::domain::ports::CardDetails;
use crate::domain::transaction::{Metadata, NewTransaction, TransactionType};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct AddMoneyRequest {
    pub user_id: UserId,
    pub card: CardDetails,
    pub amount: Decimal,
    pub idempotency_key: Option<String>,
}

impl WalletEngine {
    /// Pulls funds from a card and credits the user's wallet.
    ///
    /// The card is charged before the unit of work opens; a decline leaves no
    /// transaction behind.
    pub async fn add_money(&self, request: AddMoneyRequest) -> Result<Receipt> {
        let amount = Amount::new(request.amount)?.value();
        let key = request.idempotency_key.as_deref();

        let wallet_id = {
            let uow = self.store().begin().await;
            if let Some(tx) = uow.find_replay(&request.user_id, key).await? {
                return uow.replay_receipt(&tx).await;
            }
            let user = uow.user(&request.user_id).await?;
            user.ensure_active()?;
            uow.wallet(&user.wallet_id).await?;
            user.wallet_id
        };

        let posting = match self.cards().charge_card(&request.card, amount).await {
            Ok(posting) => posting,
            Err(decline) => {
                warn!(user_id = %request.user_id, %amount, reason = %decline, "card charge declined");
                return Err(LedgerError::ExternalDeclined(decline.message));
            }
        };

        let mut uow = self.store().begin().await;
        if let Some(tx) = uow.find_replay(&request.user_id, key).await? {
            error!(
                transaction_id = %tx.id,
                card_reference = %posting.reference,
                "duplicate add-money raced past the idempotency check; card charge needs refund"
            );
            return uow.replay_receipt(&tx).await;
        }

        let mut metadata = Metadata::new();
        metadata.insert("card_last4".into(), json!(request.card.last4()));
        metadata.insert("card_type".into(), json!(posting.card_type));
        metadata.insert("bank_name".into(), json!(posting.bank_name));
        metadata.insert("account_holder".into(), json!(posting.account_holder));
        metadata.insert("bank_old_balance".into(), json!(posting.old_balance));
        metadata.insert("bank_new_balance".into(), json!(posting.new_balance));

        let mut tx = uow
            .open_transaction(
                TransactionType::AddMoney,
                &request.user_id,
                NewTransaction {
                    receiver_id: Some(request.user_id.clone()),
                    receiver_wallet_id: Some(wallet_id.clone()),
                    amount,
                    description: Some(format!("Add money from card ****{}", request.card.last4())),
                    reference_number: Some(posting.reference.clone()),
                    metadata,
                    idempotency_key: request.idempotency_key.clone(),
                    ..Default::default()
                },
            )
            .await?;
        uow.post_external(
            &tx.id,
            ExternalAccount::CardNetwork,
            EntryType::Debit,
            amount,
            "Card charge",
        )
        .await?;
        uow.post_wallet_credit(&tx.id, &wallet_id, amount, "Add money")
            .await?;
        uow.mark_completed(&mut tx)?;
        let wallet = uow.wallet(&wallet_id).await?;

        if let Err(e) = uow.commit().await {
            error!(
                transaction_id = %tx.id,
                card_reference = %posting.reference,
                "card charged but wallet credit failed; reconciliation required: {}",
                e
            );
            return Err(e);
        }

        info!(transaction_id = %tx.id, user_id = %request.user_id, %amount, "money added");
        Ok(Receipt::new(&tx).with_balance(&wallet))
    }
}
