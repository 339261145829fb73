use opgraph_types::ObjectRef;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced blob does not exist.
    #[error("blob not found: {0}")]
    NotFound(ObjectRef),

    /// Stored bytes no longer match the digest recorded at upload.
    #[error("digest mismatch for {object}: expected {expected}, computed {computed}")]
    DigestMismatch {
        object: ObjectRef,
        expected: String,
        computed: String,
    },

    /// A blob key is empty or escapes the project namespace.
    #[error("invalid blob key `{key}`: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A writer panicked while holding the store lock.
    #[error("blob store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
