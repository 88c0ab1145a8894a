use gifstash_types::TypeError;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record is stored under the key.
    #[error("record does not exist: {0}")]
    RecordNotFound(String),

    /// No object is stored under the id.
    #[error("{0} does not exist")]
    ObjectNotFound(String),

    /// The namespace has never had an object stored in it.
    #[error("namespace does not exist: {0}")]
    NamespaceNotFound(String),

    /// A table was needed by a read-only transaction but has not been created.
    #[error("{0} does not exist and transaction is not writable")]
    TableMissing(String),

    /// The payload is not a well-formed image.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// The tenant store cannot be opened right now (lock contention, I/O).
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    /// The datastore name cannot be used as a file name.
    #[error("invalid datastore name: {0:?}")]
    InvalidDatastore(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure reported by the embedded database.
    #[error("database error: {0}")]
    Database(#[from] redb::Error),
}

impl StoreError {
    /// Whether the caller may retry the same operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::TableMissing(_) | Self::Database(_))
    }
}

macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    Self::Database(err.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
