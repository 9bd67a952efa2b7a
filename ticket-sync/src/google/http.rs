use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use super::error::{AuthError, GoogleError};

/// An HTTP client carrying the current bearer token.
///
/// Empty until the first rebuild; swapped whole on every token change.
#[derive(Debug)]
pub(crate) struct AuthorizedClient {
    timeout: Duration,
    client: RwLock<Option<reqwest::Client>>,
}

impl AuthorizedClient {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: RwLock::new(None),
        }
    }

    pub(crate) fn rebuild(&self, access_token: &str) -> Result<(), AuthError> {
        let rebuild_error = |message: String| AuthError::Rebuild { message };

        let mut value = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| rebuild_error(e.to_string()))?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| rebuild_error(e.to_string()))?;

        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
        Ok(())
    }

    /// The current client. Cloning is cheap; the lock is never held across a request.
    pub(crate) fn get(&self) -> Result<reqwest::Client, GoogleError> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| {
                GoogleError::Auth(AuthError::Rebuild {
                    message: "no access token yet".to_string(),
                })
            })
    }
}
