use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::SyncError;
use super::event::{EventSettings, build_event};
use crate::domain::{DedupKey, TravelRecord};
use crate::google::{
    CredentialManager, EventResource, EventStore, FileStore, GoogleError, OAuthFlow,
};
use crate::retry::{RetryPolicy, with_retry};

/// Result of a successful synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new event was created.
    Created { link: String },
    /// An event with the same dedup key already existed.
    AlreadySynced { link: String },
}

impl SyncOutcome {
    pub fn link(&self) -> &str {
        match self {
            SyncOutcome::Created { link } | SyncOutcome::AlreadySynced { link } => link,
        }
    }
}

/// Creates at most one calendar event per booking.
///
/// Every remote call obtains a valid token first, runs under the shared
/// retry policy, and marks the token expired when the API rejects it.
pub struct CalendarSync<E, F, O> {
    events: E,
    files: F,
    credentials: Arc<CredentialManager<O>>,
    settings: EventSettings,
    policy: RetryPolicy,
}

impl<E, F, O> CalendarSync<E, F, O>
where
    E: EventStore,
    F: FileStore,
    O: OAuthFlow,
{
    pub fn new(
        events: E,
        files: F,
        credentials: Arc<CredentialManager<O>>,
        settings: EventSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            events,
            files,
            credentials,
            settings,
            policy,
        }
    }

    /// Ensure the calendar holds an event for `record`, attaching `ticket`.
    pub async fn sync(
        &self,
        record: &TravelRecord,
        ticket: &Path,
    ) -> Result<SyncOutcome, SyncError> {
        let key = record.dedup_key();

        if let Some(link) = self
            .remote("event lookup", |_| self.events.find_by_dedup_key(key))
            .await?
        {
            info!(%key, %link, "already synchronized");
            return Ok(SyncOutcome::AlreadySynced { link });
        }

        let upload = match self.remote("ticket upload", |_| self.files.upload_pdf(ticket)).await {
            Ok(upload) => Some(upload),
            Err(e) => {
                warn!(
                    file = %ticket.display(),
                    error = %e,
                    "upload failed, creating event without attachment"
                );
                None
            }
        };

        let event = build_event(record, &self.settings, upload.as_ref());
        let outcome = self
            .remote("event insert", |attempt| self.insert_once(&event, key, attempt))
            .await?;
        match &outcome {
            SyncOutcome::Created { link } => {
                info!(%key, %link, summary = %event.summary, "event created")
            }
            SyncOutcome::AlreadySynced { link } => {
                info!(%key, %link, "event appeared during insert")
            }
        }
        Ok(outcome)
    }

    /// One insert attempt. A retry looks first, since an earlier attempt
    /// may have succeeded without us seeing the response.
    async fn insert_once(
        &self,
        event: &EventResource,
        key: &DedupKey,
        attempt: u32,
    ) -> Result<SyncOutcome, GoogleError> {
        if attempt > 0
            && let Some(link) = self.events.find_by_dedup_key(key).await?
        {
            return Ok(SyncOutcome::AlreadySynced { link });
        }

        match self.events.insert(event).await {
            Ok(link) => Ok(SyncOutcome::Created { link }),
            Err(GoogleError::Conflict { message }) => {
                if let Some(link) = self.events.find_by_dedup_key(key).await? {
                    return Ok(SyncOutcome::AlreadySynced { link });
                }
                // The id belongs to a deleted event; let the API choose one.
                warn!(%key, %message, "event id taken by a deleted event, inserting without id");
                let mut fresh = event.clone();
                fresh.id = None;
                let link = self.events.insert(&fresh).await?;
                Ok(SyncOutcome::Created { link })
            }
            Err(e) => Err(e),
        }
    }

    /// Run one remote operation with a valid token under the retry policy.
    async fn remote<T, C, Fut>(&self, operation: &'static str, call: C) -> Result<T, SyncError>
    where
        C: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, GoogleError>>,
    {
        let call = &call;
        let credentials = &self.credentials;
        with_retry(&self.policy, operation, move |attempt| async move {
            if let Err(e) = credentials.access_token().await {
                return Err(GoogleError::Auth(e));
            }
            match call(attempt).await {
                Err(GoogleError::Unauthorized) => {
                    credentials.mark_expired().await;
                    Err(GoogleError::Unauthorized)
                }
                other => other,
            }
        })
        .await
        .map_err(|e| SyncError::from_retry(operation, e))
    }
}
