//! Credential lifecycle shared by the Calendar and Drive clients.
//!
//! ```text
//! Absent ──sign-in──▶ Valid ◀──refresh── Expired
//!   ▲                   │                  │
//!   │                   └──token expires──▶┤
//!   └──────── Revoked ◀──refresh rejected──┘
//! ```
//!
//! Every transition into `Valid` persists the token and rebuilds the
//! dependent clients before any API call uses them.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credentials::{StoredToken, TokenStore};
use super::error::AuthError;
use super::oauth::OAuthFlow;

/// Where the credential lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No stored token; sign-in required.
    Absent,
    /// Read from the token store, not yet checked.
    Loaded,
    Valid,
    Expired,
    /// The refresh token was rejected; the store has been cleared.
    Revoked,
}

/// A client that carries the access token and must be rebuilt when it changes.
pub trait Rebuildable: Send + Sync {
    fn rebuild(&self, access_token: &str) -> Result<(), AuthError>;
}

struct Current {
    state: CredentialState,
    token: Option<StoredToken>,
}

/// Owns the token, its store and the clients built from it.
pub struct CredentialManager<O> {
    flow: O,
    store: TokenStore,
    scopes: Vec<String>,
    dependents: Vec<Arc<dyn Rebuildable>>,
    current: Mutex<Current>,
}

impl<O: OAuthFlow> CredentialManager<O> {
    /// Load whatever the token store holds; nothing is validated yet.
    pub fn new(flow: O, store: TokenStore, scopes: Vec<String>) -> Self {
        let token = store.load();
        let state = if token.is_some() {
            CredentialState::Loaded
        } else {
            CredentialState::Absent
        };
        debug!(path = %store.path().display(), ?state, "credential store opened");
        Self {
            flow,
            store,
            scopes,
            dependents: Vec::new(),
            current: Mutex::new(Current { state, token }),
        }
    }

    /// Register a client to rebuild on every new token.
    pub fn with_dependent(mut self, dependent: Arc<dyn Rebuildable>) -> Self {
        self.dependents.push(dependent);
        self
    }

    pub async fn state(&self) -> CredentialState {
        self.current.lock().await.state
    }

    /// A usable access token, refreshing or signing in first if needed.
    ///
    /// Callers are serialized, so concurrent requests share one refresh.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;
        loop {
            match current.state {
                CredentialState::Valid => match &current.token {
                    Some(token) if !token.is_expired(Utc::now()) => {
                        return Ok(token.access_token.clone());
                    }
                    _ => current.state = CredentialState::Expired,
                },
                CredentialState::Loaded => {
                    let Some(token) = current.token.clone() else {
                        current.state = CredentialState::Absent;
                        continue;
                    };
                    if !token.covers(&self.scopes) {
                        warn!("stored token lacks required scopes, signing in again");
                        current.state = CredentialState::Absent;
                    } else if token.is_expired(Utc::now()) {
                        current.state = CredentialState::Expired;
                    } else {
                        return self.become_valid(&mut current, token);
                    }
                }
                CredentialState::Expired => {
                    let stored = current.token.as_ref();
                    let Some(refresh_token) = stored.and_then(|t| t.refresh_token.clone()) else {
                        warn!("no refresh token, signing in again");
                        current.state = CredentialState::Absent;
                        continue;
                    };
                    match self.flow.refresh(&refresh_token).await {
                        Ok(token) => return self.become_valid(&mut current, token),
                        Err(AuthError::Revoked { message }) => {
                            warn!(%message, "refresh token rejected, clearing token store");
                            self.store.delete()?;
                            current.token = None;
                            current.state = CredentialState::Revoked;
                        }
                        Err(e) => return Err(e),
                    }
                }
                CredentialState::Absent | CredentialState::Revoked => {
                    let token = self.flow.authorize().await?;
                    return self.become_valid(&mut current, token);
                }
            }
        }
    }

    /// Obtain usable credentials now, signing in interactively if needed.
    ///
    /// Called once at startup, before any ticket is handled.
    pub async fn sign_in(&self) -> Result<(), AuthError> {
        self.access_token().await?;
        info!(state = ?self.state().await, "Google credentials ready");
        Ok(())
    }

    /// Record that the API rejected the current access token.
    pub async fn mark_expired(&self) {
        let mut current = self.current.lock().await;
        if current.state == CredentialState::Valid {
            info!("access token rejected, will refresh");
            current.state = CredentialState::Expired;
        }
    }

    fn become_valid(&self, current: &mut Current, token: StoredToken) -> Result<String, AuthError> {
        self.store.save(&token)?;
        for dependent in &self.dependents {
            dependent.rebuild(&token.access_token)?;
        }
        let access_token = token.access_token.clone();
        current.token = Some(token);
        current.state = CredentialState::Valid;
        debug!(dependents = self.dependents.len(), "credentials valid");
        Ok(access_token)
    }
}
