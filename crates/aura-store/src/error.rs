use thiserror::Error;

/// Errors raised by a key-value or history backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be reached at all (connection refused, database
    /// file locked or unopenable, poisoned connection mutex). A sweep that
    /// sees this aborts instead of continuing player by player.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure, scoped to the operation that raised it.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A stored or supplied document is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `merge_update` needs both the stored document and the patch to be
    /// JSON objects.
    #[error("Document at {key} is not a JSON object")]
    NotAnObject { key: String },
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    ErrorCode::CannotOpen
                        | ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::SystemIoFailure
                        | ErrorCode::NotADatabase
                ) =>
            {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
