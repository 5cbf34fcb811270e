use thiserror::Error;

/// Errors surfaced by the duplicate detection and merge operations.
///
/// Store-level failures are carried through unchanged in the `Database`
/// variant; callers can retry a failed merge wholesale since the transaction
/// rolls back completely.
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("potential duplicate not found: {0}")]
    DuplicateNotFound(String),

    #[error("client {0} has already been merged")]
    AlreadyMerged(String),

    #[error("potential duplicate {id} is {status}, expected PENDING")]
    NotPending { id: String, status: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
