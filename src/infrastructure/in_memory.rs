use crate::domain::ports::{StorageBackend, Table, WriteOp};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory storage backend.
///
/// Uses `Arc<RwLock<BTreeMap<..>>>` keyed by `(table, key)` so prefix scans
/// come back in key order. Ideal for tests and one-shot CLI runs where
/// persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryBackend {
    rows: Arc<RwLock<BTreeMap<(Table, String), Vec<u8>>>>,
}

impl InMemoryBackend {
    /// Creates a new, empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(table, key.to_string())).cloned())
    }

    async fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let rows = self.rows.read().await;
        Ok(rows
            .range((table, prefix.to_string())..)
            .take_while(|((t, key), _)| *t == table && key.starts_with(prefix))
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn write(&self, batch: Vec<WriteOp>) -> Result<()> {
        let mut rows = self.rows.write().await;
        for (table, key, value) in batch {
            rows.insert((table, key), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_get_and_write() {
        let backend = InMemoryBackend::new();
        backend
            .write(vec![(Table::Wallets, "W1".into(), b"one".to_vec())])
            .await
            .unwrap();

        assert_eq!(
            backend.get(Table::Wallets, "W1").await.unwrap(),
            Some(b"one".to_vec())
        );
        assert!(backend.get(Table::Users, "W1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_scan_stays_inside_table_and_prefix() {
        let backend = InMemoryBackend::new();
        backend
            .write(vec![
                (Table::Ledger, "TXN-1/000001".into(), b"b".to_vec()),
                (Table::Ledger, "TXN-1/000000".into(), b"a".to_vec()),
                (Table::Ledger, "TXN-10/000000".into(), b"x".to_vec()),
                (Table::Outbox, "TXN-1/000000".into(), b"y".to_vec()),
            ])
            .await
            .unwrap();

        let rows = backend.scan_prefix(Table::Ledger, "TXN-1/").await.unwrap();
        assert_eq!(
            rows,
            vec![
                ("TXN-1/000000".to_string(), b"a".to_vec()),
                ("TXN-1/000001".to_string(), b"b".to_vec()),
            ]
        );
    }
}
