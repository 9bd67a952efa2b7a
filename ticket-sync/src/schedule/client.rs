//! RailRadar train schedule client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::OnceCell;
use tracing::debug;

use super::error::ScheduleError;
use super::lookup::ScheduleSource;
use super::types::{Stop, TrainResponse};

/// Default base URL for the RailRadar API.
const DEFAULT_BASE_URL: &str = "https://api.railradar.in";

/// Configuration for the schedule client.
#[derive(Debug, Clone)]
pub struct ScheduleClientConfig {
    /// JSON object of HTTP headers sent with every request
    pub credentials_path: PathBuf,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ScheduleClientConfig {
    /// Create a new config reading credentials from the given file.
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Client for the RailRadar train endpoint.
///
/// Credentials are read on first use, so a process without them can still
/// handle tickets that never need a schedule. One call is one attempt;
/// retries and caching live in [`ScheduleLookup`](super::ScheduleLookup).
#[derive(Debug)]
pub struct RailRadarClient {
    config: ScheduleClientConfig,
    http: OnceCell<reqwest::Client>,
}

impl RailRadarClient {
    pub fn new(config: ScheduleClientConfig) -> Self {
        Self {
            config,
            http: OnceCell::new(),
        }
    }

    async fn http(&self) -> Result<&reqwest::Client, ScheduleError> {
        self.http
            .get_or_try_init(|| async {
                let headers = load_headers(&self.config.credentials_path)?;
                let http = reqwest::Client::builder()
                    .default_headers(headers)
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()?;
                Ok::<_, ScheduleError>(http)
            })
            .await
    }

    /// Fetch the halting stops of a line, in route order.
    pub async fn fetch_stops(&self, line_id: &str) -> Result<Vec<Stop>, ScheduleError> {
        let http = self.http().await?;
        let url = format!("{}/api/v1/trains/{}", self.config.base_url, line_id);
        debug!(line_id, "requesting schedule");

        let response = http.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ScheduleError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScheduleError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScheduleError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        let response: TrainResponse =
            serde_json::from_str(&body).map_err(|e| ScheduleError::Json {
                message: e.to_string(),
            })?;

        Ok(response.into_stops())
    }
}

impl ScheduleSource for RailRadarClient {
    async fn stops_for(&self, line_id: &str) -> Result<Vec<Stop>, ScheduleError> {
        self.fetch_stops(line_id).await
    }
}

/// Read the credentials file: a JSON object of header name to value.
fn load_headers(path: &Path) -> Result<HeaderMap, ScheduleError> {
    let credentials_error = |message: String| ScheduleError::Credentials {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| credentials_error(e.to_string()))?;
    let entries: HashMap<String, String> =
        serde_json::from_str(&text).map_err(|e| credentials_error(e.to_string()))?;

    if entries.is_empty() {
        return Err(credentials_error("no headers defined".to_string()));
    }

    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| credentials_error(format!("invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|_| credentials_error(format!("invalid value for header {name:?}")))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
