//! Error types for the worksync engine.

use thiserror::Error;

/// Errors that can occur while syncing items to a remote calendar.
///
/// Only `MissingCredentials` and `TokenRefresh` abort a full sync pass;
/// the engine absorbs the per-item and list errors into [`SyncStats`]
/// counters so one bad item never blocks the rest.
///
/// [`SyncStats`]: crate::stats::SyncStats
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("calendar connection has no usable credentials; the user must reconnect their calendar")]
    MissingCredentials,

    #[error("failed to refresh access token: {0}")]
    TokenRefresh(String),

    #[error("failed to list remote events: {0}")]
    RemoteList(String),

    #[error("remote write failed for '{local_id}': {message}")]
    RemoteWrite { local_id: String, message: String },

    #[error("remote delete failed for '{remote_id}': {message}")]
    RemoteDelete { remote_id: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True for errors that must unwind out of a sync pass entirely.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::MissingCredentials | SyncError::TokenRefresh(_))
    }
}

/// Result type alias for worksync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_credential_errors_are_fatal() {
        assert!(SyncError::MissingCredentials.is_fatal());
        assert!(SyncError::TokenRefresh("invalid_grant".into()).is_fatal());
        assert!(!SyncError::RemoteList("500".into()).is_fatal());
        assert!(!SyncError::RemoteWrite {
            local_id: "task-1".into(),
            message: "503".into()
        }
        .is_fatal());
    }
}
