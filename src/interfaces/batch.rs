use super::csv::command_reader::{CommandRecord, Op};
use crate::application::engine::WalletEngine;
use crate::application::protocols::{
    AddMoneyRequest, BankTransferRequest, BillPaymentRequest, CashOutRequest, OnboardUser,
    RegisterAgent, RegisterBiller, SendMoneyRequest,
};
use crate::domain::ids::{AgentCode, BillerId, TransactionId, UserId};
use crate::domain::party::{AccountStatus, Role};
use crate::domain::ports::CardDetails;
use crate::domain::reserve::{ReserveMemo, ReserveTransactionType};
use crate::error::{LedgerError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Applies operation rows to an engine, one at a time.
///
/// Cash-out rows may name a handle in `reference`; later
/// `complete_cash_out`/`cancel_cash_out` rows refer to the cash-out by that
/// handle since generated transaction ids are not known up front. The handle
/// doubles as the idempotency key of the cash-out request.
pub struct BatchRunner<'a> {
    engine: &'a WalletEngine,
    handles: HashMap<String, TransactionId>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a WalletEngine) -> Self {
        Self {
            engine,
            handles: HashMap::new(),
        }
    }

    pub async fn apply(&mut self, record: &CommandRecord) -> Result<Value> {
        let engine = self.engine;
        match record.op {
            Op::Onboard => {
                let role = match record.counterparty.as_deref() {
                    Some(r) if r.eq_ignore_ascii_case("agent") => Role::Agent,
                    Some(r) if !r.eq_ignore_ascii_case("consumer") => {
                        return Err(LedgerError::ValidationError(format!("Unknown role {}", r)));
                    }
                    _ => Role::Consumer,
                };
                to_json(
                    engine
                        .onboard_user(OnboardUser {
                            user_id: UserId::from(record.require_user()?),
                            role,
                            status: AccountStatus::Active,
                        })
                        .await?,
                )
            }
            Op::Agent => {
                let code = record.require_counterparty()?;
                to_json(
                    engine
                        .register_agent(RegisterAgent {
                            user_id: UserId::from(record.require_user()?),
                            agent_code: AgentCode::from(code),
                            business_name: record.reference.clone().unwrap_or_else(|| code.to_string()),
                            business_address: None,
                            status: AccountStatus::Active,
                        })
                        .await?,
                )
            }
            Op::Biller => {
                let id = record.require_user()?;
                to_json(
                    engine
                        .register_biller(RegisterBiller {
                            biller_id: BillerId::from(id),
                            code: id.to_string(),
                            name: record.reference.clone().unwrap_or_else(|| id.to_string()),
                            bill_type: record
                                .counterparty
                                .clone()
                                .unwrap_or_else(|| "UTILITY".to_string()),
                        })
                        .await?,
                )
            }
            Op::Topup => to_json(
                engine
                    .reserve_add_balance(
                        record.require_amount()?,
                        ReserveTransactionType::Adjustment,
                        ReserveMemo::new(
                            record
                                .reference
                                .clone()
                                .unwrap_or_else(|| "Reserve top-up".to_string()),
                        ),
                    )
                    .await?,
            ),
            Op::AddMoney => to_json(
                engine
                    .add_money(AddMoneyRequest {
                        user_id: UserId::from(record.require_user()?),
                        card: parse_card(record.require_counterparty()?, record.require_reference()?)?,
                        amount: record.require_amount()?,
                        idempotency_key: None,
                    })
                    .await?,
            ),
            Op::Send => to_json(
                engine
                    .send_money(SendMoneyRequest {
                        sender_id: UserId::from(record.require_user()?),
                        recipient_id: UserId::from(record.require_counterparty()?),
                        amount: record.require_amount()?,
                        description: record.reference.clone(),
                        idempotency_key: None,
                    })
                    .await?,
            ),
            Op::CashOut => {
                let receipt = engine
                    .initiate_cash_out(CashOutRequest {
                        user_id: UserId::from(record.require_user()?),
                        agent_code: AgentCode::from(record.require_counterparty()?),
                        amount: record.require_amount()?,
                        location: None,
                        notes: None,
                        idempotency_key: record.reference.clone(),
                    })
                    .await?;
                if let Some(handle) = &record.reference {
                    self.handles
                        .insert(handle.clone(), receipt.transaction_id.clone());
                }
                to_json(receipt)
            }
            Op::CompleteCashOut => {
                let id = self.resolve(record.require_reference()?);
                to_json(
                    engine
                        .complete_cash_out(&UserId::from(record.require_user()?), &id)
                        .await?,
                )
            }
            Op::CancelCashOut => {
                let id = self.resolve(record.require_reference()?);
                to_json(
                    engine
                        .cancel_cash_out(&UserId::from(record.require_user()?), &id)
                        .await?,
                )
            }
            Op::BankTransfer => {
                let user = record.require_user()?;
                to_json(
                    engine
                        .bank_transfer(BankTransferRequest {
                            user_id: UserId::from(user),
                            bank_name: record
                                .reference
                                .clone()
                                .unwrap_or_else(|| "Partner Bank".to_string()),
                            account_number: record.require_counterparty()?.to_string(),
                            account_holder: user.to_string(),
                            routing_number: None,
                            amount: record.require_amount()?,
                            description: None,
                            idempotency_key: None,
                        })
                        .await?,
                )
            }
            Op::PayBill => to_json(
                engine
                    .pay_bill(BillPaymentRequest {
                        user_id: UserId::from(record.require_user()?),
                        biller_id: BillerId::from(record.require_counterparty()?),
                        account_number: record.require_reference()?.to_string(),
                        amount: record.require_amount()?,
                        billing_month: None,
                        billing_year: None,
                        description: None,
                        idempotency_key: None,
                    })
                    .await?,
            ),
            Op::Cashback => to_json(
                engine
                    .grant_cashback(
                        &UserId::from(record.require_user()?),
                        record.require_amount()?,
                        record.reference.as_deref().unwrap_or("Cashback"),
                    )
                    .await?,
            ),
        }
    }

    fn resolve(&self, reference: &str) -> TransactionId {
        self.handles
            .get(reference)
            .cloned()
            .unwrap_or_else(|| TransactionId::from(reference))
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Parses a card given as number plus `CVV:MM/YY`.
fn parse_card(number: &str, security: &str) -> Result<CardDetails> {
    let invalid = || {
        LedgerError::ValidationError(format!(
            "Card details must be written as CVV:MM/YY, got {:?}",
            security
        ))
    };
    let (cvv, expiry) = security.split_once(':').ok_or_else(invalid)?;
    let (month, year) = expiry.split_once('/').ok_or_else(invalid)?;
    Ok(CardDetails {
        number: number.to_string(),
        cvv: cvv.to_string(),
        expiry_month: month.parse().map_err(|_| invalid())?,
        expiry_year: year.parse().map_err(|_| invalid())?,
        holder_name: None,
    })
}
