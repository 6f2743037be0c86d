//! Remote recognizer: a two-step HTTP OCR service.
//!
//! 1. `POST {endpoint}/upload` with a multipart `file` field → `{ "file_id" }`
//! 2. `POST {endpoint}/parse` with `{ file_id, language, preserve_layout }`
//!    → `{ text, confidence, language?, blocks? }`
//!
//! Both requests carry the API key as a bearer token. A non-2xx status at
//! either step fails the attempt; the retry loop sits one level up.

use super::{OcrResult, TextBlock};
use crate::backend::{CredentialProvider, RecognizeOptions, Recognizer};
use crate::error::ConvertError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name reported in [`OcrResult::engine`].
pub const REMOTE_ENGINE: &str = "remote";

#[derive(Deserialize)]
struct UploadResponse {
    file_id: String,
}

#[derive(Serialize)]
struct ParseRequest<'a> {
    file_id: &'a str,
    language: &'a str,
    preserve_layout: bool,
}

#[derive(Deserialize)]
struct ParseResponse {
    text: String,
    confidence: f32,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    blocks: Option<Vec<TextBlock>>,
}

/// HTTP client for the remote OCR service.
pub struct RemoteRecognizer {
    endpoint: Option<String>,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl RemoteRecognizer {
    /// `endpoint` is the service base URL; `None` leaves the recognizer
    /// permanently unavailable.
    pub fn new(
        endpoint: Option<String>,
        credentials: Arc<dyn CredentialProvider>,
        request_timeout: Duration,
    ) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            credentials,
            client,
        })
    }

    fn failure(detail: impl std::fmt::Display) -> ConvertError {
        ConvertError::RecognitionFailure {
            attempts: 1,
            detail: format!("remote OCR: {detail}"),
        }
    }

    async fn check(resp: reqwest::Response, step: &str) -> Result<reqwest::Response, ConvertError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(200).collect();
        Err(Self::failure(format!("{step} returned {status}: {excerpt}")))
    }

    async fn upload(&self, endpoint: &str, key: &str, png: &[u8]) -> Result<String, ConvertError> {
        let part = Part::bytes(png.to_vec())
            .file_name("page.png")
            .mime_str("image/png")
            .map_err(Self::failure)?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{endpoint}/upload"))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::failure(format!("upload: {e}")))?;
        let upload: UploadResponse = Self::check(resp, "upload")
            .await?
            .json()
            .await
            .map_err(|e| Self::failure(format!("upload response: {e}")))?;
        debug!("remote OCR: uploaded file_id={}", upload.file_id);
        Ok(upload.file_id)
    }
}

#[async_trait]
impl Recognizer for RemoteRecognizer {
    fn name(&self) -> &str {
        REMOTE_ENGINE
    }

    fn is_available(&self) -> bool {
        self.endpoint.is_some() && self.credentials.ocr_api_key().is_some()
    }

    async fn recognize(
        &self,
        png: &[u8],
        options: &RecognizeOptions,
    ) -> Result<OcrResult, ConvertError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Self::failure("no endpoint configured"))?;
        let key = self
            .credentials
            .ocr_api_key()
            .ok_or_else(|| Self::failure("no API key stored"))?;

        let file_id = self.upload(endpoint, &key, png).await?;

        let body = ParseRequest {
            file_id: &file_id,
            language: &options.language,
            preserve_layout: options.preserve_layout,
        };
        let resp = self
            .client
            .post(format!("{endpoint}/parse"))
            .bearer_auth(&key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::failure(format!("parse: {e}")))?;
        let parsed: ParseResponse = Self::check(resp, "parse")
            .await?
            .json()
            .await
            .map_err(|e| Self::failure(format!("parse response: {e}")))?;

        info!(
            "remote OCR: {} chars, confidence {:.2}",
            parsed.text.len(),
            parsed.confidence
        );
        Ok(OcrResult {
            text: parsed.text,
            confidence: parsed.confidence,
            language: parsed.language.or_else(|| Some(options.language.clone())),
            blocks: parsed.blocks,
            engine: REMOTE_ENGINE.to_string(),
        })
    }
}
