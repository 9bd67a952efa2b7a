//! Gemini API client.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::info;

use super::error::ModelError;
use super::types::{
    Blob, Content, ErrorResponse, GenerateRequest, GenerateResponse, GenerationConfig, Part,
};

/// Default base URL for the Gemini API.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Status reported by the API when a quota is used up.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// A model that reads a PDF and answers a prompt.
pub trait ModelBackend: Send + Sync {
    fn generate(
        &self,
        model: &str,
        pdf: &[u8],
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send;
}

impl<M: ModelBackend> ModelBackend for &M {
    fn generate(
        &self,
        model: &str,
        pdf: &[u8],
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send {
        (**self).generate(model, pdf, prompt)
    }
}

/// Contents of the credentials file.
#[derive(Deserialize)]
struct ModelCredentials {
    api_key: String,
}

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `{ "api_key": ... }`
    pub credentials_path: PathBuf,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f32,
}

impl GeminiConfig {
    /// Create a new config reading the API key from the given file.
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
            temperature: 0.1,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Client for Gemini's `generateContent`.
///
/// The API key is read on first use.
#[derive(Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: OnceCell<reqwest::Client>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: OnceCell::new(),
        }
    }

    async fn http(&self) -> Result<&reqwest::Client, ModelError> {
        self.http
            .get_or_try_init(|| async {
                let api_key = load_api_key(&self.config.credentials_path)?;
                let mut headers = HeaderMap::new();
                let api_key_header =
                    HeaderValue::from_str(&api_key).map_err(|_| ModelError::Credentials {
                        path: self.config.credentials_path.clone(),
                        message: "invalid API key format".to_string(),
                    })?;
                headers.insert(HeaderName::from_static("x-goog-api-key"), api_key_header);

                let http = reqwest::Client::builder()
                    .default_headers(headers)
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()?;
                Ok::<_, ModelError>(http)
            })
            .await
    }

    fn request(&self, pdf: &[u8], prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::InlineData(Blob {
                        mime_type: "application/pdf".to_string(),
                        data: STANDARD.encode(pdf),
                    }),
                    Part::Text(prompt.to_string()),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

impl ModelBackend for GeminiClient {
    async fn generate(&self, model: &str, pdf: &[u8], prompt: &str) -> Result<String, ModelError> {
        let http = self.http().await?;
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);
        info!(model, "asking model to read ticket");

        let response = http.post(&url).json(&self.request(pdf, prompt)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(model, status.as_u16(), body));
        }

        let body = response.text().await?;
        let response: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| ModelError::Json {
                message: e.to_string(),
            })?;

        response.text().ok_or_else(|| ModelError::Empty {
            model: model.to_string(),
        })
    }
}

/// Map a non-success status and body to an error.
fn classify_failure(model: &str, status: u16, body: String) -> ModelError {
    let detail = serde_json::from_str::<ErrorResponse>(&body).ok().map(|r| r.error);
    let quota = detail.as_ref().is_some_and(|d| d.status == RESOURCE_EXHAUSTED);
    let message = detail.map(|d| d.message).unwrap_or(body);

    match status {
        429 => ModelError::QuotaExhausted {
            model: model.to_string(),
        },
        _ if quota => ModelError::QuotaExhausted {
            model: model.to_string(),
        },
        401 | 403 => ModelError::Unauthorized,
        500.. => ModelError::Server { status, message },
        _ => ModelError::Client { status, message },
    }
}

fn load_api_key(path: &Path) -> Result<String, ModelError> {
    let credentials_error = |message: String| ModelError::Credentials {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| credentials_error(e.to_string()))?;
    let credentials: ModelCredentials =
        serde_json::from_str(&text).map_err(|e| credentials_error(e.to_string()))?;
    if credentials.api_key.trim().is_empty() {
        return Err(credentials_error("api_key is empty".to_string()));
    }
    Ok(credentials.api_key)
}
