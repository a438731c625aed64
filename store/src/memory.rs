//! In-memory backend.
//!
//! A `BTreeMap` per table gives the same ordered forward scans as the
//! on-disk backends. Read transactions clone a snapshot at begin; write
//! transactions hold the single-writer gate and mutate an owned copy that
//! is swapped in at commit. Dropping an uncommitted write transaction
//! discards the copy.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use crate::kv::{KvIter, KvStore, ReadTxn, Row, WriteTxn};
use crate::StoreError;

type Table = BTreeMap<Vec<u8>, Vec<u8>>;
type Tables = BTreeMap<String, Table>;

/// Volatile ordered store, primarily for tests.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    writer: Mutex<()>,
}

impl MemoryStore {
    /// Create a store with the given named tables.
    pub fn new(table_names: &[&str]) -> Self {
        let tables = table_names
            .iter()
            .map(|name| (name.to_string(), Table::new()))
            .collect();
        Self {
            tables: RwLock::new(tables),
            writer: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Tables {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl KvStore for MemoryStore {
    fn begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        Ok(Box::new(MemoryReadTxn {
            snapshot: self.snapshot(),
            lazy: true,
        }))
    }

    fn begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let gate = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let working = self.snapshot();
        Ok(Box::new(MemoryWriteTxn {
            _gate: gate,
            store: self,
            working,
            lazy: true,
        }))
    }
}

fn select_in(tables: &Tables, table: &str, key: &[u8], lazy: bool) -> Result<Row, StoreError> {
    let rows = tables
        .get(table)
        .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
    Ok(match rows.get(key) {
        None => Row::absent(),
        Some(_) if lazy => Row::lazy(),
        Some(value) => Row::with_value(value.clone()),
    })
}

fn count_in(tables: &Tables, table: &str) -> Result<u64, StoreError> {
    let rows = tables
        .get(table)
        .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
    Ok(rows.len() as u64)
}

fn scan_in<'a>(tables: &'a Tables, table: &str) -> Result<KvIter<'a>, StoreError> {
    let rows = tables
        .get(table)
        .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
    Ok(Box::new(
        rows.iter().map(|(k, v)| Ok((k.clone(), v.clone()))),
    ))
}

struct MemoryReadTxn {
    snapshot: Tables,
    lazy: bool,
}

impl ReadTxn for MemoryReadTxn {
    fn set_lazy_values(&mut self, lazy: bool) {
        self.lazy = lazy;
    }

    fn select(&self, table: &str, key: &[u8]) -> Result<Row, StoreError> {
        select_in(&self.snapshot, table, key, self.lazy)
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        count_in(&self.snapshot, table)
    }

    fn select_forward<'a>(&'a self, table: &str) -> Result<KvIter<'a>, StoreError> {
        scan_in(&self.snapshot, table)
    }
}

struct MemoryWriteTxn<'a> {
    _gate: MutexGuard<'a, ()>,
    store: &'a MemoryStore,
    working: Tables,
    lazy: bool,
}

impl MemoryWriteTxn<'_> {
    fn table_mut(&mut self, table: &str) -> Result<&mut Table, StoreError> {
        self.working
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

impl ReadTxn for MemoryWriteTxn<'_> {
    fn set_lazy_values(&mut self, lazy: bool) {
        self.lazy = lazy;
    }

    fn select(&self, table: &str, key: &[u8]) -> Result<Row, StoreError> {
        select_in(&self.working, table, key, self.lazy)
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        count_in(&self.working, table)
    }

    fn select_forward<'b>(&'b self, table: &str) -> Result<KvIter<'b>, StoreError> {
        scan_in(&self.working, table)
    }
}

impl WriteTxn for MemoryWriteTxn<'_> {
    fn synchronize_tables(&mut self, tables: &[&str]) -> Result<(), StoreError> {
        // The writer gate taken at begin covers every table; only validate
        // the declared names.
        for table in tables {
            if !self.working.contains_key(*table) {
                return Err(StoreError::UnknownTable(table.to_string()));
            }
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.table_mut(table)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove_key(&mut self, table: &str, key: &[u8]) -> Result<(), StoreError> {
        self.table_mut(table)?.remove(key);
        Ok(())
    }

    fn remove_all(&mut self, table: &str) -> Result<(), StoreError> {
        self.table_mut(table)?.clear();
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self
            .store
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(&["a", "b"])
    }

    #[test]
    fn committed_write_is_visible() {
        let store = store();
        let mut txn = store.begin_write().unwrap();
        txn.insert("a", b"k", b"v").unwrap();
        txn.commit().unwrap();

        let mut rtxn = store.begin_read().unwrap();
        rtxn.set_lazy_values(false);
        assert_eq!(rtxn.select("a", b"k").unwrap().value(), Some(&b"v"[..]));
    }

    #[test]
    fn dropped_txn_rolls_back() {
        let store = store();
        {
            let mut txn = store.begin_write().unwrap();
            txn.insert("a", b"k", b"v").unwrap();
        }
        let rtxn = store.begin_read().unwrap();
        assert!(!rtxn.select("a", b"k").unwrap().exists());
    }

    #[test]
    fn reader_snapshot_does_not_see_later_commit() {
        let store = store();
        let rtxn = store.begin_read().unwrap();

        let mut txn = store.begin_write().unwrap();
        txn.insert("a", b"k", b"v").unwrap();
        txn.commit().unwrap();

        assert!(!rtxn.select("a", b"k").unwrap().exists());
        assert!(store.begin_read().unwrap().select("a", b"k").unwrap().exists());
    }

    #[test]
    fn write_txn_sees_own_writes() {
        let store = store();
        let mut txn = store.begin_write().unwrap();
        txn.insert("a", b"k", b"v").unwrap();
        assert!(txn.select("a", b"k").unwrap().exists());
        assert_eq!(txn.count("a").unwrap(), 1);
    }

    #[test]
    fn lazy_select_carries_no_value() {
        let store = store();
        let mut txn = store.begin_write().unwrap();
        txn.insert("a", b"k", b"v").unwrap();
        txn.commit().unwrap();

        let rtxn = store.begin_read().unwrap();
        let row = rtxn.select("a", b"k").unwrap();
        assert!(row.exists());
        assert_eq!(row.value(), None);
    }

    #[test]
    fn forward_scan_is_key_ordered() {
        let store = store();
        let mut txn = store.begin_write().unwrap();
        txn.insert("a", &[3], b"three").unwrap();
        txn.insert("a", &[1], b"one").unwrap();
        txn.insert("a", &[2], b"two").unwrap();
        txn.commit().unwrap();

        let rtxn = store.begin_read().unwrap();
        let keys: Vec<Vec<u8>> = rtxn
            .select_forward("a")
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn remove_all_truncates() {
        let store = store();
        let mut txn = store.begin_write().unwrap();
        txn.insert("a", &[1], b"x").unwrap();
        txn.insert("a", &[2], b"y").unwrap();
        txn.insert("b", &[1], b"kept").unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin_write().unwrap();
        txn.remove_all("a").unwrap();
        txn.commit().unwrap();

        let rtxn = store.begin_read().unwrap();
        assert_eq!(rtxn.count("a").unwrap(), 0);
        assert_eq!(rtxn.count("b").unwrap(), 1);
    }

    #[test]
    fn remove_absent_key_is_ok() {
        let store = store();
        let mut txn = store.begin_write().unwrap();
        txn.remove_key("a", b"missing").unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn unknown_table_is_an_error() {
        let store = store();
        let rtxn = store.begin_read().unwrap();
        assert!(matches!(
            rtxn.select("nope", b"k"),
            Err(StoreError::UnknownTable(_))
        ));

        let mut txn = store.begin_write().unwrap();
        assert!(txn.synchronize_tables(&["a", "nope"]).is_err());
    }
}
