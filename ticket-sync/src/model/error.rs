//! Generative model error types.

use std::path::PathBuf;

use crate::retry::Retryable;

/// Errors from a model request.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Credentials file missing or malformed
    #[error("model credentials {path}: {message} (expected {{\"api_key\": \"...\"}})")]
    Credentials { path: PathBuf, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The model's quota is used up
    #[error("quota exhausted for model {model}")]
    QuotaExhausted { model: String },

    /// API key rejected
    #[error("unauthorized: check the model API key")]
    Unauthorized,

    /// Upstream failure
    #[error("model server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The request was rejected
    #[error("model request rejected {status}: {message}")]
    Client { status: u16, message: String },

    /// The model answered without any text
    #[error("model {model} returned an empty response")]
    Empty { model: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },
}

impl Retryable for ModelError {
    fn is_transient(&self) -> bool {
        match self {
            ModelError::Http(e) => !e.is_builder(),
            ModelError::QuotaExhausted { .. }
            | ModelError::Server { .. }
            | ModelError::Empty { .. } => true,
            ModelError::Credentials { .. }
            | ModelError::Unauthorized
            | ModelError::Client { .. }
            | ModelError::Json { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_and_empty_are_transient() {
        assert!(ModelError::QuotaExhausted { model: "m".into() }.is_transient());
        assert!(ModelError::Empty { model: "m".into() }.is_transient());
        assert!(
            ModelError::Server {
                status: 503,
                message: "overloaded".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn bad_requests_fail_fast() {
        assert!(
            !ModelError::Client {
                status: 400,
                message: "invalid argument".into()
            }
            .is_transient()
        );
        assert!(!ModelError::Unauthorized.is_transient());
        assert!(
            !ModelError::Credentials {
                path: "model.json".into(),
                message: "missing".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn error_display() {
        let err = ModelError::QuotaExhausted {
            model: "gemini-2.5-flash-lite".into(),
        };
        assert_eq!(err.to_string(), "quota exhausted for model gemini-2.5-flash-lite");

        let err = ModelError::Credentials {
            path: "model.json".into(),
            message: "missing".into(),
        };
        assert!(err.to_string().contains(r#"{"api_key": "..."}"#));
    }
}
