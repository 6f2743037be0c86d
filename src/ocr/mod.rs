//! OCR strategy: image (or scanned PDF) → plain text.
//!
//! ## Pipeline
//!
//! ```text
//! raster ──► preprocess ──► remote recognizer ──(retry)──┐
//!            (optional)          │ skipped without     │ exhausted
//!                                │ endpoint or key     ▼
//!                                └────────────► local recognizer
//!                                                      │
//!                                     post-process ◄───┘
//! ```
//!
//! The remote recognizer is retried per [`crate::retry::RetryPolicy`]; once
//! it is exhausted (or unavailable) the local recognizer always gets a
//! turn. Only when that fails too does the caller see an error,
//! [`ConvertError::FallbackExhausted`].
//!
//! PDFs try their own text layer first and fall back to rendering pages and
//! recognizing them only when every page is blank.

pub mod postprocess;
pub mod preprocess;
pub mod remote;
pub mod tesseract;

use crate::backend::{PdfEngine, RecognizeOptions, Recognizer};
use crate::config::OcrConfig;
use crate::document::pdf::join_pages;
use crate::error::ConvertError;
use crate::fallback::FallbackChain;
use crate::progress::{report, ConversionStage, ProgressCallback};
use crate::raster;
use crate::retry::retry_with_policy;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence reported when a PDF's own text layer was used.
pub const PDF_TEXT_CONFIDENCE: f32 = 1.0;

/// Confidence reported for PDFs that had to be recognized page by page.
pub const PDF_OCR_CONFIDENCE: f32 = 0.85;

/// Engine name for text read straight from a PDF text layer.
pub const PDF_TEXT_ENGINE: &str = "pdf-text";

/// Pixel rectangle, origin at the top-left of the page image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A positioned piece of recognized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// What a recognizer returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    /// 0.0–1.0.
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<TextBlock>>,
    /// Which recognizer produced the text.
    #[serde(default)]
    pub engine: String,
}

/// Pull the bare detail out of a recognizer error.
fn failure_detail(error: &ConvertError) -> String {
    match error {
        ConvertError::RecognitionFailure { detail, .. } => detail.clone(),
        other => other.to_string(),
    }
}

/// Recognition pipeline bound to its two recognizers.
pub struct OcrPipeline {
    primary: Arc<dyn Recognizer>,
    fallback: Arc<dyn Recognizer>,
    config: OcrConfig,
    progress: Option<ProgressCallback>,
}

impl OcrPipeline {
    pub fn new(
        primary: Arc<dyn Recognizer>,
        fallback: Arc<dyn Recognizer>,
        config: OcrConfig,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            primary,
            fallback,
            config,
            progress,
        }
    }

    fn stage(&self, stage: ConversionStage) {
        report(self.progress.as_ref(), stage);
    }

    fn options(&self) -> RecognizeOptions {
        RecognizeOptions {
            language: self.config.language.clone(),
            preserve_layout: self.config.preserve_layout,
        }
    }

    /// Turn a decoded raster into the PNG the recognizers receive.
    async fn prepare(&self, image: DynamicImage) -> Result<Vec<u8>, ConvertError> {
        let preprocess = self.config.preprocess;
        let contrast = self.config.contrast;
        if preprocess {
            self.stage(ConversionStage::Preprocessing);
        }
        tokio::task::spawn_blocking(move || {
            if preprocess {
                preprocess::encode_png(&preprocess::preprocess_image(&image, contrast))
            } else {
                preprocess::encode_png(&image.to_rgba8())
            }
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("OCR preprocess task panicked: {}", e)))?
    }

    /// Recognize any supported raster image.
    pub async fn recognize_image(&self, bytes: Vec<u8>) -> Result<OcrResult, ConvertError> {
        self.stage(ConversionStage::Decoding);
        let image = tokio::task::spawn_blocking(move || raster::decode_image(&bytes))
            .await
            .map_err(|e| ConvertError::Internal(format!("Image task panicked: {}", e)))??;
        let png = self.prepare(image).await?;
        self.recognize_png(&png).await
    }

    /// Remote-with-retry, then local, then post-processing.
    pub async fn recognize_png(&self, png: &[u8]) -> Result<OcrResult, ConvertError> {
        let options = self.options();
        let policy = self.config.retry_policy();
        let primary = &self.primary;
        let fallback = &self.fallback;
        let opts = &options;

        let remote_ready = primary.is_available();
        if !remote_ready {
            info!(
                "OCR: '{}' unavailable (no endpoint or credential), using '{}'",
                primary.name(),
                fallback.name()
            );
        }

        let chain = FallbackChain::new()
            .attempt_if(remote_ready, primary.name().to_string(), move || async move {
                retry_with_policy(policy, primary.name(), |attempt| {
                    self.stage(ConversionStage::PrimaryRecognition {
                        attempt: attempt + 1,
                    });
                    primary.recognize(png, opts)
                })
                .await
                .map_err(|e| ConvertError::RecognitionFailure {
                    attempts: policy.max_attempts(),
                    detail: failure_detail(&e),
                })
            })
            .attempt(fallback.name().to_string(), move || async move {
                self.stage(ConversionStage::FallbackRecognition);
                fallback.recognize(png, opts).await
            });

        let mut result = match chain.run().await {
            Ok(success) => {
                if success.fell_back() {
                    warn!("OCR: recovered with '{}'", success.winner);
                }
                success.value
            }
            Err(exhausted) => {
                let primary_error = exhausted
                    .failures
                    .iter()
                    .find(|f| f.name == primary.name())
                    .map(|f| f.error.to_string());
                let fallback_error = exhausted
                    .last()
                    .map(|f| failure_detail(&f.error))
                    .unwrap_or_else(|| "no recognizer available".to_string());
                return Err(ConvertError::FallbackExhausted {
                    primary: primary_error,
                    fallback: fallback_error,
                });
            }
        };

        self.stage(ConversionStage::PostProcessing);
        result.text = postprocess::clean_text(&result.text, self.config.fix_common_errors);
        debug!(
            "OCR: '{}' produced {} chars at confidence {:.2}",
            result.engine,
            result.text.len(),
            result.confidence
        );
        Ok(result)
    }

    /// PDF → text: the text layer when there is one, otherwise OCR of the
    /// first pages.
    pub async fn recognize_pdf(
        &self,
        engine: &Arc<dyn PdfEngine>,
        pdf: Vec<u8>,
    ) -> Result<OcrResult, ConvertError> {
        self.stage(ConversionStage::Decoding);
        let pdf = Arc::new(pdf);

        let pages = {
            let engine = Arc::clone(engine);
            let pdf = Arc::clone(&pdf);
            tokio::task::spawn_blocking(move || engine.extract_pages(&pdf))
                .await
                .map_err(|e| ConvertError::Internal(format!("PDF task panicked: {}", e)))??
        };

        if pages.iter().any(|p| !p.trim().is_empty()) {
            debug!("PDF has a text layer ({} pages), skipping OCR", pages.len());
            return Ok(OcrResult {
                text: join_pages(&pages),
                confidence: PDF_TEXT_CONFIDENCE,
                language: None,
                blocks: None,
                engine: PDF_TEXT_ENGINE.to_string(),
            });
        }

        let max_pages = self.config.max_pdf_pages;
        let scale = self.config.pdf_render_scale;
        let images = {
            let engine = Arc::clone(engine);
            tokio::task::spawn_blocking(move || {
                let count = engine.page_count(&pdf)?;
                let limit = count.min(max_pages);
                if count > limit {
                    warn!(
                        "PDF has {} pages, recognizing the first {} only",
                        count, limit
                    );
                }
                info!(
                    "PDF has no text layer, recognizing {} pages at {}x",
                    limit, scale
                );
                engine.render_pages(&pdf, limit, scale)
            })
            .await
            .map_err(|e| ConvertError::Internal(format!("PDF task panicked: {}", e)))??
        };

        let total = images.len();
        let mut texts = Vec::with_capacity(total);
        let mut engine_name = None;
        for (idx, image) in images.into_iter().enumerate() {
            self.stage(ConversionStage::RenderingPage {
                page: idx + 1,
                total,
            });
            let png = self.prepare(image).await?;
            let page = self.recognize_png(&png).await?;
            engine_name.get_or_insert(page.engine);
            texts.push(page.text);
        }

        Ok(OcrResult {
            text: join_pages(&texts),
            confidence: PDF_OCR_CONFIDENCE,
            language: Some(self.config.language.clone()),
            blocks: None,
            engine: engine_name.unwrap_or_else(|| self.fallback.name().to_string()),
        })
    }
}
