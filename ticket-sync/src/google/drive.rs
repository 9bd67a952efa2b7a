//! Google Drive upload of ticket files.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tracing::debug;

use super::error::{AuthError, GoogleError, error_for_response};
use super::http::AuthorizedClient;
use super::manager::Rebuildable;
use super::types::UploadReference;

/// Default multipart upload endpoint.
const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

const BOUNDARY: &str = "ticket_sync_upload_boundary";

/// Where ticket files are stored for attachment.
pub trait FileStore: Send + Sync {
    fn upload_pdf(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<UploadReference, GoogleError>> + Send;
}

impl<F: FileStore> FileStore for &F {
    fn upload_pdf(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<UploadReference, GoogleError>> + Send {
        (**self).upload_pdf(path)
    }
}

impl<F: FileStore> FileStore for Arc<F> {
    fn upload_pdf(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<UploadReference, GoogleError>> + Send {
        (**self).upload_pdf(path)
    }
}

/// Drive API client. Usable once the credential manager has rebuilt it.
#[derive(Debug)]
pub struct GoogleDrive {
    upload_url: String,
    http: AuthorizedClient,
}

impl GoogleDrive {
    pub fn new() -> Self {
        Self::with_upload_url(DEFAULT_UPLOAD_URL)
    }

    /// Use a custom upload endpoint (for testing).
    pub fn with_upload_url(url: impl Into<String>) -> Self {
        Self {
            upload_url: url.into(),
            http: AuthorizedClient::new(Duration::from_secs(120)),
        }
    }
}

impl Default for GoogleDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl Rebuildable for GoogleDrive {
    fn rebuild(&self, access_token: &str) -> Result<(), AuthError> {
        self.http.rebuild(access_token)
    }
}

impl FileStore for GoogleDrive {
    async fn upload_pdf(&self, path: &Path) -> Result<UploadReference, GoogleError> {
        let http = self.http.get()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ticket.pdf".to_string());
        let content = tokio::fs::read(path).await?;
        debug!(file = %name, bytes = content.len(), "uploading ticket");

        let response = http
            .post(&self.upload_url)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,mimeType,webViewLink"),
            ])
            .header(CONTENT_TYPE, format!("multipart/related; boundary={BOUNDARY}"))
            .body(multipart_body(&name, &content))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GoogleError::Json {
            message: e.to_string(),
        })
    }
}

/// A `multipart/related` body: JSON metadata, then the file.
fn multipart_body(name: &str, content: &[u8]) -> Vec<u8> {
    let metadata = json!({ "name": name, "mimeType": "application/pdf" });
    let mut body = Vec::with_capacity(content.len() + 256);
    let json_part =
        format!("--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n");
    let pdf_part = format!("\r\n--{BOUNDARY}\r\nContent-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(json_part.as_bytes());
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(pdf_part.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
