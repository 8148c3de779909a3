//! Redb backend for persistent embedding storage.
//!
//! Redb is a pure Rust embedded key-value store with ACID transactions. Each
//! `put` is its own write transaction, which gives the per-record atomicity
//! the embedding store relies on for upserts.
//!
//! # Configuration Example
//! ```yaml
//! store:
//!   backend:
//!     kind: redb
//!     path: "/data/facegate.redb"
//! ```

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use ::redb::{Database, ReadableDatabase, TableDefinition};

use crate::backend::prefix_end;
use crate::{StoreBackend, StoreError};

/// Single table holding embeddings, subjects and logs, separated by key prefix.
const FACEGATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("facegate_data");

/// Redb backend implementation.
///
/// The `Arc<Database>` wrapper allows sharing across threads; redb handles its
/// own locking and MVCC.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create a Redb database at the given path.
    ///
    /// ```no_run
    /// use store::RedbBackend;
    ///
    /// let backend = RedbBackend::open("/tmp/facegate.redb").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::unavailable)?;

        // Opening the table inside a write txn creates it on first use.
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;
        {
            let _table = write_txn
                .open_table(FACEGATE_TABLE)
                .map_err(StoreError::unavailable)?;
        }
        write_txn.commit().map_err(StoreError::unavailable)?;

        tracing::debug!("redb backend ready");
        Ok(Self { db: Arc::new(db) })
    }
}

impl StoreBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        {
            let mut table = write_txn
                .open_table(FACEGATE_TABLE)
                .map_err(StoreError::unavailable)?;
            table.insert(key, value).map_err(StoreError::unavailable)?;
        }
        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let table = read_txn
            .open_table(FACEGATE_TABLE)
            .map_err(StoreError::unavailable)?;

        match table.get(key).map_err(StoreError::unavailable)? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        {
            let mut table = write_txn
                .open_table(FACEGATE_TABLE)
                .map_err(StoreError::unavailable)?;
            table.remove(key).map_err(StoreError::unavailable)?;
        }
        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(StoreError::unavailable)?;
        {
            let mut table = write_txn
                .open_table(FACEGATE_TABLE)
                .map_err(StoreError::unavailable)?;
            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(StoreError::unavailable)?;
            }
        }
        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let table = read_txn
            .open_table(FACEGATE_TABLE)
            .map_err(StoreError::unavailable)?;

        for item in table.range(prefix..).map_err(StoreError::unavailable)? {
            let (key, value) = item.map_err(StoreError::unavailable)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            visitor(key, value.value())?;
        }
        Ok(())
    }

    fn scan_prefix_rev(
        &self,
        prefix: &str,
        limit: usize,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::unavailable)?;
        let table = read_txn
            .open_table(FACEGATE_TABLE)
            .map_err(StoreError::unavailable)?;

        let end = prefix_end(prefix);
        let upper = match end.as_deref() {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let range = table
            .range::<&str>((Bound::Included(prefix), upper))
            .map_err(StoreError::unavailable)?;
        for item in range.rev().take(limit) {
            let (key, value) = item.map_err(StoreError::unavailable)?;
            visitor(key.value(), value.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn redb_roundtrip_and_delete() {
        let temp_file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(temp_file.path()).unwrap();

        backend.put("key1", b"value1").unwrap();
        assert_eq!(backend.get("key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(backend.get("missing").unwrap(), None);

        backend.delete("key1").unwrap();
        assert_eq!(backend.get("key1").unwrap(), None);
    }

    #[test]
    fn redb_prefix_scan_stops_at_prefix_end() {
        let temp_file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(temp_file.path()).unwrap();

        backend
            .batch_put(vec![
                ("emb/1/t/a".to_string(), b"a".to_vec()),
                ("emb/1/t/b".to_string(), b"b".to_vec()),
                ("emb/1/u/a".to_string(), b"other".to_vec()),
                ("usr/1/t/a".to_string(), b"subject".to_vec()),
            ])
            .unwrap();

        let mut collected = Vec::new();
        backend
            .scan_prefix("emb/1/t/", &mut |_, value| {
                collected.push(value.to_vec());
                Ok(())
            })
            .unwrap();

        assert_eq!(collected, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn redb_reverse_scan_is_bounded_to_prefix() {
        let temp_file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(temp_file.path()).unwrap();

        backend
            .batch_put(vec![
                ("log/1/t/1".to_string(), b"1".to_vec()),
                ("log/1/t/2".to_string(), b"2".to_vec()),
                ("log/1/t/3".to_string(), b"3".to_vec()),
                ("log/1/u/1".to_string(), b"other".to_vec()),
            ])
            .unwrap();

        let mut collected = Vec::new();
        backend
            .scan_prefix_rev("log/1/t/", 2, &mut |_, value| {
                collected.push(value.to_vec());
                Ok(())
            })
            .unwrap();

        assert_eq!(collected, vec![b"3".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn redb_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facegate.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put("persisted", b"yes").unwrap();
        }
        let backend = RedbBackend::open(&path).unwrap();
        assert_eq!(backend.get("persisted").unwrap(), Some(b"yes".to_vec()));
    }
}
