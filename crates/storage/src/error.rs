use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote cart store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Collapse any failure into the single error a remote caller sees.
    pub(crate) fn into_remote(self) -> Self {
        match self {
            Self::RemoteUnavailable(_) => self,
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }

    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}
