use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
