use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wallet_ledger::application::engine::EngineSettings;
use wallet_ledger::application::protocols::CashOutRequest;
use wallet_ledger::domain::ids::{AgentCode, UserId};
use wallet_ledger::domain::ledger::{ExternalAccount, LedgerAccount};
use wallet_ledger::domain::party::AccountStatus;
use wallet_ledger::domain::records::CashoutStatus;
use wallet_ledger::domain::reserve::{ReserveMemo, ReserveTransactionType};
use wallet_ledger::domain::transaction::{TransactionStatus, TransactionType};
use wallet_ledger::error::LedgerError;

mod common;
use common::{OPENING_RESERVE, agent, balance, consumer, fund, harness, harness_with};

fn cash_out(user: &UserId, code: &AgentCode, amount: Decimal) -> CashOutRequest {
    CashOutRequest {
        user_id: user.clone(),
        agent_code: code.clone(),
        amount,
        location: Some("Mirpur 10".into()),
        notes: None,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn test_two_phase_cash_out() {
    let h = harness().await;
    let alice = consumer(&h, "alice").await;
    let (agent_user, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(1000.00)).await;

    let pending = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(200.00)))
        .await
        .unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_eq!(pending.fee, dec!(3.70));
    assert_eq!(pending.total_amount, dec!(203.70));
    assert_eq!(pending.commission, Some(dec!(3.00)));

    // Nothing moves before the agent confirms.
    assert_eq!(balance(&h, &alice).await, dec!(1000.00));
    assert_eq!(h.engine.reserve_balance().await.unwrap(), OPENING_RESERVE);
    let record = h.engine.cash_out_record(&pending.transaction_id).await.unwrap();
    assert_eq!(record.status, CashoutStatus::Pending);
    assert_eq!(record.fee_rate, dec!(1.85));
    assert_eq!(record.commission_rate, dec!(1.5));

    let done = h
        .engine
        .complete_cash_out(&agent_user, &pending.transaction_id)
        .await
        .unwrap();
    assert_eq!(done.status, TransactionStatus::Completed);
    assert_eq!(done.balance_of(&alice), Some(dec!(796.30)));
    assert_eq!(done.balance_of(&agent_user), Some(dec!(3.00)));
    assert_eq!(
        h.engine.reserve_balance().await.unwrap(),
        OPENING_RESERVE - dec!(3.00)
    );

    let wallet = h.engine.wallet_of(&alice).await.unwrap();
    assert_eq!(wallet.daily_spent.value(), dec!(203.70));
    assert_eq!(wallet.monthly_spent.value(), dec!(203.70));

    let record = h.engine.cash_out_record(&pending.transaction_id).await.unwrap();
    assert_eq!(record.status, CashoutStatus::Completed);
    let stats = h.engine.agent(&code).await.unwrap();
    assert_eq!(stats.total_cashouts, 1);
    assert_eq!(stats.total_commission_earned, dec!(3.00));

    let entries = h.engine.ledger_entries(&pending.transaction_id).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(
        entries
            .iter()
            .any(|e| e.account == LedgerAccount::External(ExternalAccount::AgentSettlement))
    );
    assert!(h.engine.verify_ledger(&pending.transaction_id).await.unwrap());

    let commission = h
        .engine
        .transactions_for(&agent_user)
        .await
        .unwrap()
        .into_iter()
        .find(|tx| tx.kind == TransactionType::Commission)
        .unwrap();
    assert_eq!(commission.amount, dec!(3.00));
    assert_eq!(commission.status, TransactionStatus::Completed);
    assert_eq!(
        commission.reference_number.as_deref(),
        Some(pending.transaction_id.as_str())
    );

    let reserve = h.engine.reserve_statistics().await.unwrap();
    assert_eq!(reserve.total_commissions_paid, dec!(3.00));
    assert!(h.engine.reconcile_reserve().await.unwrap().success);
}

#[tokio::test]
async fn test_completion_is_single_shot() {
    let h = harness().await;
    let alice = consumer(&h, "alice").await;
    let (agent_user, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(1000.00)).await;

    let pending = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(200.00)))
        .await
        .unwrap();
    h.engine
        .complete_cash_out(&agent_user, &pending.transaction_id)
        .await
        .unwrap();
    let err = h
        .engine
        .complete_cash_out(&agent_user, &pending.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert_eq!(balance(&h, &alice).await, dec!(796.30));
}

#[tokio::test]
async fn test_only_assigned_agent_completes() {
    let h = harness().await;
    let alice = consumer(&h, "alice").await;
    let (_, code) = agent(&h, "karim", "AG001").await;
    let (other_agent, _) = agent(&h, "salma", "AG002").await;
    fund(&h, &alice, dec!(1000.00)).await;

    let pending = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(200.00)))
        .await
        .unwrap();

    let err = h
        .engine
        .complete_cash_out(&other_agent, &pending.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let err = h
        .engine
        .complete_cash_out(&alice, &pending.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let tx = h.engine.transaction(&pending.transaction_id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_initiation_rejections() {
    let h = harness().await;
    let alice = consumer(&h, "alice").await;
    let (agent_user, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(100.00)).await;

    // 100 + 1.85 fee exceeds the balance.
    let err = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(100.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    let err = h
        .engine
        .initiate_cash_out(cash_out(&alice, &AgentCode::new("AG404"), dec!(10.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { kind: "Agent", .. }));

    fund(&h, &agent_user, dec!(100.00)).await;
    let err = h
        .engine
        .initiate_cash_out(cash_out(&agent_user, &code, dec!(10.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)));

    h.engine
        .set_agent_status(&code, AccountStatus::Suspended)
        .await
        .unwrap();
    let err = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(10.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InactiveAccount(_)));
}

#[tokio::test]
async fn test_reserve_exhaustion_keeps_request_pending() {
    let h = harness_with(EngineSettings::default(), dec!(1.00)).await;
    let alice = consumer(&h, "alice").await;
    let (agent_user, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(1000.00)).await;

    let pending = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(200.00)))
        .await
        .unwrap();
    let err = h
        .engine
        .complete_cash_out(&agent_user, &pending.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientReserve { .. }));

    assert_eq!(balance(&h, &alice).await, dec!(1000.00));
    assert_eq!(balance(&h, &agent_user).await, dec!(0));
    let tx = h.engine.transaction(&pending.transaction_id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert!(h.engine.ledger_entries(&pending.transaction_id).await.unwrap().is_empty());

    // Once the reserve is topped up the same request completes.
    h.engine
        .reserve_add_balance(
            dec!(100.00),
            ReserveTransactionType::Adjustment,
            ReserveMemo::new("top-up"),
        )
        .await
        .unwrap();
    h.engine
        .complete_cash_out(&agent_user, &pending.transaction_id)
        .await
        .unwrap();
    assert_eq!(balance(&h, &alice).await, dec!(796.30));
}

#[tokio::test]
async fn test_cancel_by_requester() {
    let h = harness().await;
    let alice = consumer(&h, "alice").await;
    let bob = consumer(&h, "bob").await;
    let (agent_user, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(500.00)).await;

    let pending = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(100.00)))
        .await
        .unwrap();

    let err = h
        .engine
        .cancel_cash_out(&bob, &pending.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let tx = h
        .engine
        .cancel_cash_out(&alice, &pending.transaction_id)
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.failed_reason.as_deref(), Some("cancelled by requester"));
    let record = h.engine.cash_out_record(&pending.transaction_id).await.unwrap();
    assert_eq!(record.status, CashoutStatus::Cancelled);

    let err = h
        .engine
        .complete_cash_out(&agent_user, &pending.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert_eq!(balance(&h, &alice).await, dec!(500.00));
}

#[tokio::test]
async fn test_stale_requests_expire() {
    let settings = EngineSettings {
        cash_out_ttl: TimeDelta::minutes(30),
        ..Default::default()
    };
    let h = harness_with(settings, OPENING_RESERVE).await;
    let alice = consumer(&h, "alice").await;
    let (agent_user, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(500.00)).await;

    let pending = h
        .engine
        .initiate_cash_out(cash_out(&alice, &code, dec!(100.00)))
        .await
        .unwrap();

    // Nothing is older than the TTL yet.
    assert_eq!(h.engine.expire_stale_cash_outs().await.unwrap(), 0);

    let expired = h
        .engine
        .expire_cash_outs_before(Utc::now() + TimeDelta::minutes(1))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let tx = h.engine.transaction(&pending.transaction_id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.failed_reason.as_deref(), Some("expired"));
    let record = h.engine.cash_out_record(&pending.transaction_id).await.unwrap();
    assert_eq!(record.status, CashoutStatus::Failed);
    assert!(
        h.engine
            .complete_cash_out(&agent_user, &pending.transaction_id)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_idempotent_initiation() {
    let h = harness().await;
    let alice = consumer(&h, "alice").await;
    let (_, code) = agent(&h, "karim", "AG001").await;
    fund(&h, &alice, dec!(500.00)).await;

    let mut request = cash_out(&alice, &code, dec!(100.00));
    request.idempotency_key = Some("atm-1".into());
    let first = h.engine.initiate_cash_out(request.clone()).await.unwrap();
    let second = h.engine.initiate_cash_out(request).await.unwrap();

    assert_eq!(first.transaction_id, second.transaction_id);
    assert!(second.replayed);
    assert_eq!(second.commission, Some(dec!(1.50)));
}
