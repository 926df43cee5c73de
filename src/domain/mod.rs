//! Pure domain types and the ports the engine talks to the outside world through.

pub mod fees;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod party;
pub mod ports;
pub mod records;
pub mod reserve;
pub mod transaction;
pub mod wallet;
