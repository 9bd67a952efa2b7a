//! Google API and authorization error types.

use std::path::PathBuf;

use crate::retry::Retryable;

/// Errors from obtaining or refreshing credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Client secrets file missing or malformed
    #[error("client secrets {path}: {message}")]
    Secrets { path: PathBuf, message: String },

    /// Token store could not be written or removed
    #[error("token store {path}: {message}")]
    TokenStore { path: PathBuf, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The user withdrew consent or the refresh token expired
    #[error("authorization revoked: {message}")]
    Revoked { message: String },

    /// Token endpoint returned an error status
    #[error("token endpoint error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Interactive sign-in did not complete
    #[error("sign-in failed: {message}")]
    SignIn { message: String },

    /// A dependent client could not be rebuilt with the new token
    #[error("failed to rebuild client: {message}")]
    Rebuild { message: String },
}

impl Retryable for AuthError {
    fn is_transient(&self) -> bool {
        match self {
            AuthError::Http(e) => !e.is_builder(),
            AuthError::Api { status, .. } => *status >= 500 || *status == 429,
            AuthError::Secrets { .. }
            | AuthError::TokenStore { .. }
            | AuthError::Revoked { .. }
            | AuthError::Json { .. }
            | AuthError::SignIn { .. }
            | AuthError::Rebuild { .. } => false,
        }
    }
}

/// Errors from the Calendar and Drive APIs.
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Access token rejected
    #[error("unauthorized (access token rejected)")]
    Unauthorized,

    /// Rate limited by the API
    #[error("rate limited by Google API")]
    RateLimited,

    /// A resource with the same id already exists
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Failed to read a file for upload
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    /// Credentials could not be obtained
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl Retryable for GoogleError {
    fn is_transient(&self) -> bool {
        match self {
            GoogleError::Http(e) => !e.is_builder(),
            // The credential manager refreshes before the next attempt
            GoogleError::Unauthorized => true,
            GoogleError::RateLimited => true,
            GoogleError::Api { status, .. } => *status >= 500,
            GoogleError::Auth(e) => e.is_transient(),
            GoogleError::Conflict { .. } | GoogleError::Json { .. } | GoogleError::Io(_) => false,
        }
    }
}

/// Map a non-success response to an error.
pub(crate) async fn error_for_response(response: reqwest::Response) -> GoogleError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(status.as_u16(), body)
}

pub(crate) fn classify_status(status: u16, body: String) -> GoogleError {
    match status {
        401 => GoogleError::Unauthorized,
        409 => GoogleError::Conflict { message: body },
        429 => GoogleError::RateLimited,
        403 if body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded") => {
            GoogleError::RateLimited
        }
        _ => GoogleError::Api {
            status,
            message: body,
        },
    }
}
