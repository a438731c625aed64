//! Backend traits: named tables, transactions, forward scans.
//!
//! Keys order lexicographically over raw bytes. A forward scan yields rows
//! in that order. Write transactions see their own uncommitted writes;
//! readers opened before a commit never observe it (snapshot isolation).

use crate::StoreError;

/// Result of a point lookup.
///
/// With lazy values (the default) a present row carries no value — only its
/// existence. Eager mode loads the full value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    exists: bool,
    value: Option<Vec<u8>>,
}

impl Row {
    /// A row for a key that is not present.
    pub fn absent() -> Self {
        Self {
            exists: false,
            value: None,
        }
    }

    /// A present row probed without loading its value.
    pub fn lazy() -> Self {
        Self {
            exists: true,
            value: None,
        }
    }

    /// A present row with its value loaded.
    pub fn with_value(value: Vec<u8>) -> Self {
        Self {
            exists: true,
            value: Some(value),
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn into_value(self) -> Option<Vec<u8>> {
        self.value
    }
}

/// Forward scan over a table, ascending by raw-byte key.
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

/// Read operations available inside any transaction.
pub trait ReadTxn {
    /// Toggle lazy value loading. Lazy is on by default: `select` reports
    /// existence without copying the value out of the store.
    fn set_lazy_values(&mut self, lazy: bool);

    /// Point lookup.
    fn select(&self, table: &str, key: &[u8]) -> Result<Row, StoreError>;

    /// Number of rows in a table.
    fn count(&self, table: &str) -> Result<u64, StoreError>;

    /// Scan every row of a table in ascending key order.
    fn select_forward<'a>(&'a self, table: &str) -> Result<KvIter<'a>, StoreError>;
}

/// Mutating operations. Dropping an uncommitted write transaction rolls
/// every pending operation back.
pub trait WriteTxn: ReadTxn {
    /// Declare the tables this transaction will mutate, acquiring their
    /// write locks up front.
    fn synchronize_tables(&mut self, tables: &[&str]) -> Result<(), StoreError>;

    /// Insert or overwrite a row.
    fn insert(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove a row. Removing an absent key is not an error.
    fn remove_key(&mut self, table: &str, key: &[u8]) -> Result<(), StoreError>;

    /// Remove every row of a table. The backing file need not shrink.
    fn remove_all(&mut self, table: &str) -> Result<(), StoreError>;

    /// Commit all pending operations atomically.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// An ordered transactional key-value store with named tables.
pub trait KvStore: Send + Sync {
    /// Open a read-only snapshot transaction.
    fn begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError>;

    /// Open a write transaction. Backends serialise writers; a second
    /// writer blocks until the first commits or rolls back.
    fn begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError>;
}
