//! LMDB environment setup.

use std::collections::HashMap;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use keel_store::{KvStore, ReadTxn, StoreError, WriteTxn};

use crate::transaction::{LmdbReadTxn, LmdbWriteTxn};
use crate::LmdbError;

/// Wraps the LMDB environment and the database handle for each named table.
#[derive(Debug)]
pub struct LmdbStore {
    env: Env,
    pub(crate) dbs: HashMap<String, Database<Bytes, Bytes>>,
}

impl LmdbStore {
    /// Open or create an LMDB environment at the given path, creating one
    /// database per named table.
    pub fn open(path: &Path, tables: &[&str], map_size: usize) -> Result<Self, LmdbError> {
        if path.as_os_str().is_empty() {
            return Err(LmdbError::InvalidPath);
        }
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("failed to create directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(tables.len() as u32)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut dbs = HashMap::with_capacity(tables.len());
        for &table in tables {
            let db = env.create_database(&mut wtxn, Some(table))?;
            dbs.insert(table.to_string(), db);
        }
        wtxn.commit()?;

        Ok(Self { env, dbs })
    }

    pub(crate) fn db(&self, table: &str) -> Result<Database<Bytes, Bytes>, StoreError> {
        self.dbs
            .get(table)
            .copied()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    /// Force an `fsync` of the LMDB memory-mapped file to disk.
    ///
    /// LMDB ensures durability on every write-transaction commit; this is an
    /// extra measure for graceful shutdown so the OS has flushed all dirty
    /// pages before the process exits.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        let wtxn = self.env.write_txn()?;
        wtxn.commit()?;
        Ok(())
    }
}

impl KvStore for LmdbStore {
    fn begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        let txn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbReadTxn::new(self, txn)))
    }

    fn begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let txn = self.env.write_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbWriteTxn::new(self, txn)))
    }
}
