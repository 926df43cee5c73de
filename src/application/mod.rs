//! Application layer: the unit-of-work boundary and the `WalletEngine`.
//!
//! The ledger, wallet, reserve and lifecycle components are `impl UnitOfWork`
//! blocks so a protocol can compose them inside one atomic unit of work. The
//! protocols themselves live on `WalletEngine`.

pub mod engine;
pub mod ledger;
pub mod lifecycle;
pub mod outbox;
pub mod protocols;
pub mod receipt;
pub mod reserve;
pub mod store;
pub mod wallets;
