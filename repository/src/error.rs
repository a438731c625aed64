use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backend surfaced a fault, or a persisted row failed to decode.
    /// The surrounding transaction is rolled back.
    #[error("storage error: {0}")]
    Store(#[from] keel_store::StoreError),

    /// A batched lookup was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// A precondition was violated. Raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
