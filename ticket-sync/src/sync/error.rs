use crate::google::{AuthError, GoogleError};
use crate::retry::RetryError;

/// Why a record could not be synchronized.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The API rejected the request in a way retrying cannot fix
    #[error("{operation} failed: {source}")]
    Rejected {
        operation: &'static str,
        #[source]
        source: GoogleError,
    },

    /// Every attempt failed transiently
    #[error("{operation} gave up after {attempts} attempts: {last}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: GoogleError,
    },
}

impl SyncError {
    pub(crate) fn from_retry(operation: &'static str, err: RetryError<GoogleError>) -> Self {
        match err {
            RetryError::Permanent(source) => SyncError::Rejected { operation, source },
            RetryError::Exhausted { attempts, last } => SyncError::Exhausted {
                operation,
                attempts,
                last,
            },
        }
    }

    /// The credential failure behind this error, if that is what it was.
    pub fn auth_error(&self) -> Option<&AuthError> {
        let source = match self {
            SyncError::Rejected { source, .. } => source,
            SyncError::Exhausted { last, .. } => last,
        };
        match source {
            GoogleError::Auth(e) => Some(e),
            _ => None,
        }
    }
}
