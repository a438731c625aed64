//! Read and write transactions over the LMDB environment.

use heed::{RoTxn, RwTxn};

use keel_store::{KvIter, ReadTxn, Row, StoreError, WriteTxn};

use crate::environment::LmdbStore;
use crate::LmdbError;

fn select_with(
    store: &LmdbStore,
    txn: &RoTxn,
    table: &str,
    key: &[u8],
    lazy: bool,
) -> Result<Row, StoreError> {
    let db = store.db(table)?;
    Ok(match db.get(txn, key).map_err(LmdbError::from)? {
        None => Row::absent(),
        Some(_) if lazy => Row::lazy(),
        Some(value) => Row::with_value(value.to_vec()),
    })
}

fn count_with(store: &LmdbStore, txn: &RoTxn, table: &str) -> Result<u64, StoreError> {
    let db = store.db(table)?;
    Ok(db.len(txn).map_err(LmdbError::from)?)
}

fn scan_with<'a>(store: &LmdbStore, txn: &'a RoTxn, table: &str) -> Result<KvIter<'a>, StoreError> {
    let db = store.db(table)?;
    let iter = db.iter(txn).map_err(LmdbError::from)?;
    Ok(Box::new(iter.map(|entry| {
        entry
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .map_err(|e| StoreError::from(LmdbError::from(e)))
    })))
}

pub struct LmdbReadTxn<'a> {
    store: &'a LmdbStore,
    txn: RoTxn<'a>,
    lazy: bool,
}

impl<'a> LmdbReadTxn<'a> {
    pub(crate) fn new(store: &'a LmdbStore, txn: RoTxn<'a>) -> Self {
        Self {
            store,
            txn,
            lazy: true,
        }
    }
}

impl ReadTxn for LmdbReadTxn<'_> {
    fn set_lazy_values(&mut self, lazy: bool) {
        self.lazy = lazy;
    }

    fn select(&self, table: &str, key: &[u8]) -> Result<Row, StoreError> {
        select_with(self.store, &self.txn, table, key, self.lazy)
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        count_with(self.store, &self.txn, table)
    }

    fn select_forward<'b>(&'b self, table: &str) -> Result<KvIter<'b>, StoreError> {
        scan_with(self.store, &self.txn, table)
    }
}

pub struct LmdbWriteTxn<'a> {
    store: &'a LmdbStore,
    txn: RwTxn<'a>,
    lazy: bool,
}

impl<'a> LmdbWriteTxn<'a> {
    pub(crate) fn new(store: &'a LmdbStore, txn: RwTxn<'a>) -> Self {
        Self {
            store,
            txn,
            lazy: true,
        }
    }
}

impl ReadTxn for LmdbWriteTxn<'_> {
    fn set_lazy_values(&mut self, lazy: bool) {
        self.lazy = lazy;
    }

    fn select(&self, table: &str, key: &[u8]) -> Result<Row, StoreError> {
        select_with(self.store, &self.txn, table, key, self.lazy)
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        count_with(self.store, &self.txn, table)
    }

    fn select_forward<'b>(&'b self, table: &str) -> Result<KvIter<'b>, StoreError> {
        scan_with(self.store, &self.txn, table)
    }
}

impl WriteTxn for LmdbWriteTxn<'_> {
    fn synchronize_tables(&mut self, tables: &[&str]) -> Result<(), StoreError> {
        // The LMDB environment holds a single global write lock taken at
        // begin; declared names are still validated so a schema typo fails
        // before any write lands.
        for table in tables {
            self.store.db(table)?;
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let db = self.store.db(table)?;
        db.put(&mut self.txn, key, value).map_err(LmdbError::from)?;
        Ok(())
    }

    fn remove_key(&mut self, table: &str, key: &[u8]) -> Result<(), StoreError> {
        let db = self.store.db(table)?;
        db.delete(&mut self.txn, key).map_err(LmdbError::from)?;
        Ok(())
    }

    fn remove_all(&mut self, table: &str) -> Result<(), StoreError> {
        let db = self.store.db(table)?;
        db.clear(&mut self.txn).map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
