//! Google Calendar client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use super::error::{AuthError, GoogleError, error_for_response};
use super::http::AuthorizedClient;
use super::manager::Rebuildable;
use super::types::{DEDUP_PROPERTY, EventItem, EventList, EventResource};
use crate::domain::DedupKey;

/// Default base URL for the Calendar API.
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Where events are written.
pub trait EventStore: Send + Sync {
    /// Link to an existing event carrying `key`, if any.
    fn find_by_dedup_key(
        &self,
        key: &DedupKey,
    ) -> impl Future<Output = Result<Option<String>, GoogleError>> + Send;

    /// Create the event and return its link.
    fn insert(
        &self,
        event: &EventResource,
    ) -> impl Future<Output = Result<String, GoogleError>> + Send;
}

impl<E: EventStore> EventStore for &E {
    fn find_by_dedup_key(
        &self,
        key: &DedupKey,
    ) -> impl Future<Output = Result<Option<String>, GoogleError>> + Send {
        (**self).find_by_dedup_key(key)
    }

    fn insert(
        &self,
        event: &EventResource,
    ) -> impl Future<Output = Result<String, GoogleError>> + Send {
        (**self).insert(event)
    }
}

impl<E: EventStore> EventStore for Arc<E> {
    fn find_by_dedup_key(
        &self,
        key: &DedupKey,
    ) -> impl Future<Output = Result<Option<String>, GoogleError>> + Send {
        (**self).find_by_dedup_key(key)
    }

    fn insert(
        &self,
        event: &EventResource,
    ) -> impl Future<Output = Result<String, GoogleError>> + Send {
        (**self).insert(event)
    }
}

/// Configuration for the calendar client.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub calendar_id: String,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl CalendarConfig {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Calendar API client. Usable once the credential manager has rebuilt it.
#[derive(Debug)]
pub struct GoogleCalendar {
    config: CalendarConfig,
    http: AuthorizedClient,
}

impl GoogleCalendar {
    pub fn new(config: CalendarConfig) -> Self {
        let http = AuthorizedClient::new(Duration::from_secs(config.timeout_secs));
        Self { config, http }
    }

    fn events_url(&self) -> Result<Url, GoogleError> {
        let url_error = |message: String| GoogleError::Api { status: 0, message };
        let mut url = Url::parse(&self.config.base_url).map_err(|e| url_error(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| url_error(format!("cannot be a base URL: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(["calendars", self.config.calendar_id.as_str(), "events"]);
        Ok(url)
    }
}

impl Rebuildable for GoogleCalendar {
    fn rebuild(&self, access_token: &str) -> Result<(), AuthError> {
        self.http.rebuild(access_token)
    }
}

impl EventStore for GoogleCalendar {
    async fn find_by_dedup_key(&self, key: &DedupKey) -> Result<Option<String>, GoogleError> {
        let http = self.http.get()?;
        let filter = format!("{DEDUP_PROPERTY}={key}");
        debug!(calendar = %self.config.calendar_id, %key, "looking up event");

        let response = http
            .get(self.events_url()?)
            .query(&[
                ("privateExtendedProperty", filter.as_str()),
                ("singleEvents", "true"),
                ("maxResults", "10"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let body = response.text().await?;
        let list: EventList = serde_json::from_str(&body).map_err(|e| GoogleError::Json {
            message: e.to_string(),
        })?;
        Ok(list
            .items
            .iter()
            .find(|item| item.status.as_deref() != Some("cancelled"))
            .map(EventItem::link))
    }

    async fn insert(&self, event: &EventResource) -> Result<String, GoogleError> {
        let http = self.http.get()?;
        let mut request = http.post(self.events_url()?);
        if !event.attachments.is_empty() {
            request = request.query(&[("supportsAttachments", "true")]);
        }
        debug!(calendar = %self.config.calendar_id, summary = %event.summary, "inserting event");

        let response = request.json(event).send().await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let body = response.text().await?;
        let item: EventItem = serde_json::from_str(&body).map_err(|e| GoogleError::Json {
            message: e.to_string(),
        })?;
        Ok(item.link())
    }
}
