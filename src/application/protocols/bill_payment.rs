use crate::application::engine::WalletEngine;
use crate::application::receipt::Receipt;
use crate::domain::ids::{BillerId, UserId, receipt_number};
use crate::domain::money::Amount;
use crate::domain::records::{BillPayment, ExternalLegStatus};
use crate::domain::transaction::{Metadata, NewTransaction, TransactionType};
use crate::domain::wallet::SpendingPeriod;
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct BillPaymentRequest {
    pub user_id: UserId,
    pub biller_id: BillerId,
    /// The payer's account number at the biller.
    pub account_number: String,
    pub amount: Decimal,
    pub billing_month: Option<String>,
    pub billing_year: Option<i32>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl WalletEngine {
    /// Pays a biller from the user's wallet. Bill payments carry no fee.
    pub async fn pay_bill(&self, request: BillPaymentRequest) -> Result<Receipt> {
        let amount = Amount::new(request.amount)?.value();
        if request.account_number.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Biller account number is required".to_string(),
            ));
        }

        let mut uow = self.store().begin().await;
        if let Some(tx) = uow
            .find_replay(&request.user_id, request.idempotency_key.as_deref())
            .await?
        {
            let payment: BillPayment = uow.fetch("Bill payment", tx.id.as_str()).await?;
            let mut receipt = uow.replay_receipt(&tx).await?;
            receipt.receipt_number = payment.receipt_number;
            return Ok(receipt);
        }

        let user = uow.user(&request.user_id).await?;
        user.ensure_active()?;
        let biller = uow.biller(&request.biller_id).await?;
        biller.ensure_accepting()?;

        let periods = [SpendingPeriod::Daily, SpendingPeriod::Monthly];
        let wallet = uow.wallet(&user.wallet_id).await?;
        wallet.ensure_available(amount)?;
        wallet.ensure_within_limits(amount, &periods)?;

        let mut metadata = Metadata::new();
        metadata.insert("biller_code".into(), json!(biller.code));
        metadata.insert("bill_type".into(), json!(biller.bill_type));
        metadata.insert("account_number".into(), json!(request.account_number));

        let mut tx = uow
            .open_transaction(
                TransactionType::BillPayment,
                &user.user_id,
                NewTransaction {
                    sender_id: Some(user.user_id.clone()),
                    sender_wallet_id: Some(user.wallet_id.clone()),
                    amount,
                    description: request
                        .description
                        .clone()
                        .or_else(|| Some(format!("{} bill payment", biller.name))),
                    metadata,
                    idempotency_key: request.idempotency_key.clone(),
                    ..Default::default()
                },
            )
            .await?;

        uow.post_wallet_debit(&tx.id, &user.wallet_id, amount, &periods, "Bill payment")
            .await?;
        uow.post_biller_credit(&tx.id, &biller.id, amount, "Bill payment received")
            .await?;

        let now = Utc::now();
        let receipt_no = receipt_number(now);
        uow.put(&BillPayment {
            transaction_id: tx.id.clone(),
            biller_id: biller.id.clone(),
            user_id: user.user_id.clone(),
            account_number: request.account_number,
            amount,
            fee: Decimal::ZERO,
            status: ExternalLegStatus::Completed,
            billing_month: request.billing_month,
            billing_year: request.billing_year,
            receipt_number: Some(receipt_no.clone()),
            created_at: now,
        })?;
        uow.mark_completed(&mut tx)?;
        let wallet = uow.wallet(&user.wallet_id).await?;
        uow.commit().await?;

        info!(
            transaction_id = %tx.id,
            user_id = %user.user_id,
            biller = %biller.id,
            %amount,
            receipt = %receipt_no,
            "bill paid"
        );
        let mut receipt = Receipt::new(&tx).with_balance(&wallet);
        receipt.receipt_number = Some(receipt_no);
        Ok(receipt)
    }
}
