use gifstash_store::StoreError;

/// Errors that can occur during admission and account management.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A rule pattern does not compile as a regular expression.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// No account matches the given token or id.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Neither the caller's identity nor the request path names a tenant.
    #[error("could not find datastore for {0}")]
    TenantNotFound(String),

    /// The administrator account could not be provisioned or announced.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// A stage returned an unexpected error.
    #[error("stage error in '{stage}': {message}")]
    StageError { stage: String, message: String },

    /// Failure in the underlying store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GateError {
    /// Create a stage error with a name and message.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageError {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl From<redb::TransactionError> for GateError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Store(err.into())
    }
}

impl From<redb::StorageError> for GateError {
    fn from(err: redb::StorageError) -> Self {
        Self::Store(err.into())
    }
}

impl From<redb::CommitError> for GateError {
    fn from(err: redb::CommitError) -> Self {
        Self::Store(err.into())
    }
}

/// Result alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;
