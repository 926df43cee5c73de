//! Adapters implementing the domain ports.

pub mod in_memory;
pub mod rates;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated_bank;
