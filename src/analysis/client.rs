use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use tempfile::NamedTempFile;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::dto::{AnalysisMethod, AnalysisResult, RawAnalysisResponse};
use crate::error::ApiError;

/// Multipart field name shared with the vision service.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("vision service timed out: {0}")]
    Timeout(String),
    #[error("vision service unreachable: {0}")]
    BackendUnavailable(String),
    #[error("{message}")]
    Upstream { message: String, details: String },
    #[error("staging upload: {0:#}")]
    Staging(anyhow::Error),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Timeout(details) => ApiError::Timeout {
                message: "Request timeout - AI processing took too long".into(),
                details,
            },
            AnalysisError::BackendUnavailable(details) => ApiError::BackendUnavailable {
                message: "Vision backend not running. Start the OCR/vision service and retry".into(),
                details,
            },
            AnalysisError::Upstream { message, details } => ApiError::Upstream {
                message,
                details: Some(details),
            },
            AnalysisError::Staging(e) => ApiError::Internal(e),
        }
    }
}

fn classify(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout(e.to_string())
    } else if e.is_connect() {
        AnalysisError::BackendUnavailable(e.to_string())
    } else {
        AnalysisError::Upstream {
            message: "Failed to process image".into(),
            details: e.to_string(),
        }
    }
}

/// Forwards label photos to the external OCR/vision service.
#[derive(Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    upload_dir: PathBuf,
}

impl VisionClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, timeout: Duration, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
            upload_dir: upload_dir.into(),
        }
    }

    /// Stages the image on disk, streams it to the vision service and
    /// normalizes the reply. The staged file is removed on every path.
    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn analyze(
        &self,
        image: Bytes,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let staged = self.stage(&image).await.map_err(AnalysisError::Staging)?;
        info!(path = %staged.path().display(), "sending image to vision backend");
        // `staged` drops (and unlinks) when this function returns
        self.send(&staged, filename, content_type).await
    }

    async fn stage(&self, image: &[u8]) -> anyhow::Result<NamedTempFile> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("create {}", self.upload_dir.display()))?;
        let staged = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.upload_dir)
            .context("create temp file")?;
        tokio::fs::write(staged.path(), image)
            .await
            .context("write temp file")?;
        Ok(staged)
    }

    async fn send(
        &self,
        staged: &NamedTempFile,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let file = tokio::fs::File::open(staged.path())
            .await
            .context("open staged upload")
            .map_err(AnalysisError::Staging)?;
        let len = file
            .metadata()
            .await
            .context("stat staged upload")
            .map_err(AnalysisError::Staging)?
            .len();

        let mut part = Part::stream_with_length(reqwest::Body::from(file), len).file_name(filename.to_string());
        if let Some(ct) = content_type.filter(|ct| ct.starts_with("image/")) {
            part = part.mime_str(ct).map_err(classify)?;
        }
        let form = Form::new().part(IMAGE_FIELD, part);

        let res = self
            .http
            .post(&self.url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "vision request failed");
                classify(e)
            })?;

        let status = res.status();
        let body = res.bytes().await.map_err(classify)?;

        if !status.is_success() {
            let upstream_error = serde_json::from_slice::<RawAnalysisResponse>(&body)
                .ok()
                .and_then(|r| r.error);
            warn!(%status, error = ?upstream_error, "vision backend error");
            return Err(AnalysisError::Upstream {
                message: upstream_error.unwrap_or_else(|| "Failed to process image".into()),
                details: format!("vision service returned {}", status),
            });
        }

        let raw: RawAnalysisResponse = serde_json::from_slice(&body).map_err(|e| AnalysisError::Upstream {
            message: "Failed to process image".into(),
            details: format!("malformed vision response: {}", e),
        })?;

        let result = to_result(raw)?;
        info!(method = ?result.method, "analysis complete");
        Ok(result)
    }
}

fn to_result(raw: RawAnalysisResponse) -> Result<AnalysisResult, AnalysisError> {
    let analysis = raw.analysis.ok_or_else(|| AnalysisError::Upstream {
        message: raw.error.clone().unwrap_or_else(|| "Failed to process image".into()),
        details: "vision response has no analysis".into(),
    })?;

    let method = match raw.method.as_deref() {
        Some("ocr") => AnalysisMethod::Ocr,
        Some("vision") => AnalysisMethod::Vision,
        _ if raw.ocr_text.is_some() => AnalysisMethod::Ocr,
        _ => AnalysisMethod::Vision,
    };
    let ocr_text = match method {
        AnalysisMethod::Ocr => Some(raw.ocr_text.unwrap_or_default()),
        AnalysisMethod::Vision => None,
    };

    Ok(AnalysisResult {
        method,
        analysis,
        ocr_text,
        timestamp: OffsetDateTime::now_utc(),
    })
}
