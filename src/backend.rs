//! OCR backend HTTP API client.
//!
//! Endpoints:
//! - `POST /api/config` `{use_easyocr, use_tesseract}` selects engines.
//! - `POST /api/capture/screen` reads the whole screen.
//! - `POST /api/capture/region` `{x, y, width, height}` reads a rectangle.
//! - `POST /api/upload/image` multipart with one `file` field.
//! - `GET /api/health` reachability.
//!
//! Every OCR endpoint answers with an [`OcrResult`]. Any non-2xx status is a
//! failure; the body's `detail` (or `error`) field becomes the message.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{OcrResult, Region};

/// Default backend base URL when not set by flag, env or config.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// OCR calls can take a while on large screens.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const HEALTH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Could not reach the backend at {base}: {source}")]
    Unreachable {
        base: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("Failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Engine selection pushed before each OCR request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub use_easyocr: bool,
    pub use_tesseract: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn push_config(&self, config: EngineConfig) -> Result<(), BackendError> {
        let resp = self.send(self.http.post(self.url("/api/config")).json(&config)).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        debug!(?config, "Engine config pushed");
        Ok(())
    }

    pub async fn capture_screen(&self) -> Result<OcrResult, BackendError> {
        let req = self.http.post(self.url("/api/capture/screen"));
        self.ocr_request(req).await
    }

    pub async fn capture_region(&self, region: Region) -> Result<OcrResult, BackendError> {
        let req = self.http.post(self.url("/api/capture/region")).json(&region);
        self.ocr_request(req).await
    }

    /// Reads `path` and uploads it under its file name.
    pub async fn upload_image(&self, path: &Path) -> Result<OcrResult, BackendError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| BackendError::File {
                path: path.display().to_string(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.upload_image_bytes(&filename, bytes).await
    }

    pub async fn upload_image_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<OcrResult, BackendError> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("file", part);
        let req = self.http.post(self.url("/api/upload/image")).multipart(form);
        self.ocr_request(req).await
    }

    /// True if `GET /api/health` answers 2xx within a few seconds.
    pub async fn health_check(&self) -> bool {
        let req = self
            .http
            .get(self.url("/api/health"))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS));
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(error = %err, "Health check failed");
                false
            }
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        req.send().await.map_err(|source| BackendError::Unreachable {
            base: self.base.clone(),
            source,
        })
    }

    async fn ocr_request(&self, req: reqwest::RequestBuilder) -> Result<OcrResult, BackendError> {
        let resp = self.send(req).await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            let result: OcrResult = serde_json::from_str(&body)?;
            debug!(
                chars = result.text.len(),
                boxes = result.bounding_boxes.len(),
                "OCR response parsed"
            );
            Ok(result)
        } else {
            let err = status_error(status, &body);
            warn!(error = %err, "OCR request rejected");
            Err(err)
        }
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.detail.or(r.error))
        .unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or("");
            if body.trim().is_empty() {
                reason.to_string()
            } else {
                body.trim().to_string()
            }
        });
    BackendError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_prefers_detail() {
        let err = status_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail": "no display"}"#,
        );
        assert!(matches!(
            err,
            BackendError::Status { status: 500, ref message } if message == "no display"
        ));
    }

    #[test]
    fn test_status_error_falls_back_to_body_or_reason() {
        let err = status_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, BackendError::Status { ref message, .. } if message == "upstream down"));

        let err = status_error(reqwest::StatusCode::NOT_FOUND, "");
        assert!(matches!(err, BackendError::Status { status: 404, ref message } if message == "Not Found"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        let client = BackendClient::new("http://ocr.local:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://ocr.local:8000");
        assert_eq!(client.url("/api/health"), "http://ocr.local:8000/api/health");
    }
}
