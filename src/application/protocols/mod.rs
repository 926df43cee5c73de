//! Money-movement protocols, one per module. Each is an inherent method on
//! [`WalletEngine`](super::engine::WalletEngine).

pub mod add_money;
pub mod bank_transfer;
pub mod bill_payment;
pub mod cash_out;
pub mod onboarding;
pub mod send_money;

pub use add_money::AddMoneyRequest;
pub use bank_transfer::BankTransferRequest;
pub use bill_payment::BillPaymentRequest;
pub use cash_out::CashOutRequest;
pub use onboarding::{OnboardUser, OnboardingReceipt, RegisterAgent, RegisterBiller};
pub use send_money::SendMoneyRequest;
