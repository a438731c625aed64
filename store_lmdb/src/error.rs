use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("storage path is empty")]
    InvalidPath,
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<LmdbError> for keel_store::StoreError {
    fn from(e: LmdbError) -> Self {
        keel_store::StoreError::Backend(e.to_string())
    }
}
