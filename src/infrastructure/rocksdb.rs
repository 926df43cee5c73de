use crate::domain::ports::{StorageBackend, Table, WriteOp};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// A persistent storage backend using RocksDB.
///
/// Every logical [`Table`] lives in its own column family named after the
/// table. Batches are applied with a single `WriteBatch`, so a committed unit
/// of work is either fully on disk or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<DB>,
}

impl RocksDBBackend {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = Table::ALL
            .iter()
            .map(|table| ColumnFamilyDescriptor::new(table.name(), Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, table: Table) -> Result<&ColumnFamily> {
        self.db.cf_handle(table.name()).ok_or_else(|| {
            LedgerError::StorageError(format!("column family {} not found", table.name()))
        })
    }
}

#[async_trait]
impl StorageBackend for RocksDBBackend {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(table)?;
        Ok(self.db.get_cf(cf, key.as_bytes())?)
    }

    async fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let cf = self.cf(table)?;
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let key = String::from_utf8(key.into_vec())
                .map_err(|e| LedgerError::StorageError(format!("non UTF-8 key: {}", e)))?;
            rows.push((key, value.into_vec()));
        }
        Ok(rows)
    }

    async fn write(&self, batch: Vec<WriteOp>) -> Result<()> {
        let mut write_batch = WriteBatch::default();
        for (table, key, value) in batch {
            let cf = self.cf(table)?;
            write_batch.put_cf(cf, key.as_bytes(), value);
        }
        self.db.write(write_batch)?;
        Ok(())
    }
}
