//! Configuration types for file conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Settings are grouped by strategy
//! ([`OcrConfig`], [`MediaConfig`], [`LayoutConfig`]); the capability
//! providers (PDF engine, recognizers, transcoder, audio codec, credentials)
//! are optional trait objects that fall back to the built-in engines when
//! left unset.

use crate::backend::{
    CredentialProvider, NativeAudioCodec, PdfEngine, Recognizer, StaticCredentials,
    TranscoderLoader,
};
use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a [`crate::Converter`].
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_fileconv::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .ocr_language("deu")
///     .ocr_max_retries(4)
///     .pdf_ocr_fallback(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr.retry_policy().max_retries, 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Text recognition settings.
    pub ocr: OcrConfig,

    /// Audio/video settings.
    pub media: MediaConfig,

    /// Page geometry for text → PDF.
    pub layout: LayoutConfig,

    /// Route `pdf → txt` through the OCR entry point instead of plain
    /// text-layer extraction. Default: false.
    ///
    /// When on, scanned PDFs (no text layer) are rendered and recognised;
    /// PDFs with a text layer still take the structural path.
    pub pdf_ocr_fallback: bool,

    /// Scale factor for `pdf → image` rendering. Default: 2.0.
    pub pdf_render_scale: f32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF reader/rasteriser. Default: pdfium.
    pub pdf_engine: Option<Arc<dyn PdfEngine>>,

    /// Primary text recognizer. Default: the remote OCR service.
    pub primary_recognizer: Option<Arc<dyn Recognizer>>,

    /// Local fallback recognizer. Default: the `tesseract` CLI.
    pub fallback_recognizer: Option<Arc<dyn Recognizer>>,

    /// Media transcoder factory. Default: ffmpeg.
    pub transcoder_loader: Option<Arc<dyn TranscoderLoader>>,

    /// In-process audio codec for the mp3/wav fast path. Default: symphonia + hound.
    pub audio_codec: Option<Arc<dyn NativeAudioCodec>>,

    /// Source of the remote OCR credential. Default: `FILECONV_OCR_API_KEY`.
    pub credentials: Option<Arc<dyn CredentialProvider>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            media: MediaConfig::default(),
            layout: LayoutConfig::default(),
            pdf_ocr_fallback: false,
            pdf_render_scale: 2.0,
            download_timeout_secs: 120,
            pdf_engine: None,
            primary_recognizer: None,
            fallback_recognizer: None,
            transcoder_loader: None,
            audio_codec: None,
            credentials: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("ocr", &self.ocr)
            .field("media", &self.media)
            .field("layout", &self.layout)
            .field("pdf_ocr_fallback", &self.pdf_ocr_fallback)
            .field("pdf_render_scale", &self.pdf_render_scale)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("pdf_engine", &self.pdf_engine.as_ref().map(|_| "<dyn PdfEngine>"))
            .field(
                "primary_recognizer",
                &self.primary_recognizer.as_ref().map(|r| r.name().to_string()),
            )
            .field(
                "fallback_recognizer",
                &self.fallback_recognizer.as_ref().map(|r| r.name().to_string()),
            )
            .field(
                "transcoder_loader",
                &self.transcoder_loader.as_ref().map(|_| "<dyn TranscoderLoader>"),
            )
            .field("audio_codec", &self.audio_codec.as_ref().map(|_| "<dyn NativeAudioCodec>"))
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

// ── Sub-configs ──────────────────────────────────────────────────────────

/// Text recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Base URL of the remote OCR service (`{endpoint}/upload`, `{endpoint}/parse`).
    /// Remote recognition is skipped when unset.
    pub endpoint: Option<String>,

    /// Recognition language code. Default: "eng".
    pub language: String,

    /// Ask the remote service to keep the page layout. Default: false.
    pub preserve_layout: bool,

    /// Run contrast/threshold/sharpen before recognition. Default: true.
    pub preprocess: bool,

    /// Contrast stretch factor around mid-grey. Default: 1.2.
    pub contrast: f32,

    /// Apply the digit → letter substitutions in post-processing. Default: true.
    ///
    /// They fix "H3LL0"-style misreads but corrupt legitimate alphanumeric
    /// identifiers such as "B52" or "A1"; turn off for such documents.
    pub fix_common_errors: bool,

    /// Retries for the remote recognizer. Default: 2.
    pub max_retries: u32,

    /// Base retry delay in ms (linear backoff). Default: 1000.
    pub retry_delay_ms: u64,

    /// Per-request timeout for the remote recognizer in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Path to the `tesseract` executable. Default: looked up on `PATH`.
    pub tesseract_path: Option<PathBuf>,

    /// Most pages rendered by the PDF OCR path. Default: 10.
    pub max_pdf_pages: usize,

    /// Render scale for the PDF OCR path. Default: 2.0.
    pub pdf_render_scale: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            language: "eng".to_string(),
            preserve_layout: false,
            preprocess: true,
            contrast: 1.2,
            fix_common_errors: true,
            max_retries: 2,
            retry_delay_ms: 1000,
            request_timeout_secs: 60,
            tesseract_path: None,
            max_pdf_pages: 10,
            pdf_render_scale: 2.0,
        }
    }
}

impl OcrConfig {
    /// Retry policy for one recognition call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay_ms)
    }
}

/// Audio/video settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to the ffmpeg executable. Default: looked up on `PATH`.
    pub ffmpeg_path: Option<PathBuf>,

    /// Try in-process decode/encode for mp3 ↔ wav before the transcoder.
    /// Default: true.
    pub native_audio: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            native_audio: true,
        }
    }
}

/// Page geometry for generated PDFs, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Default: 595 (A4).
    pub page_width: f32,
    /// Default: 842 (A4).
    pub page_height: f32,
    /// Margin on all four sides. Default: 50.
    pub margin: f32,
    /// Default: 12.
    pub font_size: f32,
    /// Line advance as a multiple of the font size. Default: 1.2.
    pub line_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin: 50.0,
            font_size: 12.0,
            line_height: 1.2,
        }
    }
}

impl LayoutConfig {
    /// Width available for text.
    pub fn printable_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    /// Vertical distance between baselines.
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// Lines that fit between the top and bottom margins.
    ///
    /// The first baseline sits one font size below the top margin; each
    /// further line must keep its baseline above the bottom margin.
    pub fn lines_per_page(&self) -> usize {
        let usable = self.page_height - 2.0 * self.margin - self.font_size;
        if usable < 0.0 {
            return 1;
        }
        (usable / self.line_advance()).floor() as usize + 1
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn media(mut self, media: MediaConfig) -> Self {
        self.config.media = media;
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.ocr.endpoint = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn ocr_preserve_layout(mut self, v: bool) -> Self {
        self.config.ocr.preserve_layout = v;
        self
    }

    pub fn ocr_preprocess(mut self, v: bool) -> Self {
        self.config.ocr.preprocess = v;
        self
    }

    pub fn ocr_contrast(mut self, factor: f32) -> Self {
        self.config.ocr.contrast = factor;
        self
    }

    pub fn ocr_fix_common_errors(mut self, v: bool) -> Self {
        self.config.ocr.fix_common_errors = v;
        self
    }

    pub fn ocr_max_retries(mut self, n: u32) -> Self {
        self.config.ocr.max_retries = n;
        self
    }

    pub fn ocr_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.ocr.retry_delay_ms = ms;
        self
    }

    pub fn ocr_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr.request_timeout_secs = secs;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ocr.tesseract_path = Some(path.into());
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.media.ffmpeg_path = Some(path.into());
        self
    }

    pub fn native_audio(mut self, v: bool) -> Self {
        self.config.media.native_audio = v;
        self
    }

    pub fn pdf_ocr_fallback(mut self, v: bool) -> Self {
        self.config.pdf_ocr_fallback = v;
        self
    }

    pub fn pdf_render_scale(mut self, scale: f32) -> Self {
        self.config.pdf_render_scale = scale;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdf_engine(mut self, engine: Arc<dyn PdfEngine>) -> Self {
        self.config.pdf_engine = Some(engine);
        self
    }

    pub fn primary_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.config.primary_recognizer = Some(recognizer);
        self
    }

    pub fn fallback_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.config.fallback_recognizer = Some(recognizer);
        self
    }

    pub fn transcoder_loader(mut self, loader: Arc<dyn TranscoderLoader>) -> Self {
        self.config.transcoder_loader = Some(loader);
        self
    }

    pub fn audio_codec(mut self, codec: Arc<dyn NativeAudioCodec>) -> Self {
        self.config.audio_codec = Some(codec);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Use a fixed OCR API key instead of the environment.
    pub fn ocr_api_key(self, key: impl Into<String>) -> Self {
        self.credentials(Arc::new(StaticCredentials(Some(key.into()))))
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !(c.ocr.contrast > 0.0 && c.ocr.contrast.is_finite()) {
            return Err(ConvertError::InvalidConfig(format!(
                "OCR contrast must be a positive number, got {}",
                c.ocr.contrast
            )));
        }
        if c.ocr.language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.ocr.max_pdf_pages == 0 {
            return Err(ConvertError::InvalidConfig(
                "OCR page limit must be ≥ 1".into(),
            ));
        }
        for (name, scale) in [
            ("PDF render scale", c.pdf_render_scale),
            ("OCR render scale", c.ocr.pdf_render_scale),
        ] {
            if !(scale > 0.0 && scale <= 8.0) {
                return Err(ConvertError::InvalidConfig(format!(
                    "{name} must be in (0, 8], got {scale}"
                )));
            }
        }
        if let Some(ref endpoint) = c.ocr.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConvertError::InvalidConfig(format!(
                    "OCR endpoint must be an HTTP(S) URL, got '{endpoint}'"
                )));
            }
        }
        let l = &c.layout;
        if l.font_size <= 0.0 || l.line_height <= 0.0 {
            return Err(ConvertError::InvalidConfig(
                "Font size and line height must be positive".into(),
            ));
        }
        if l.printable_width() <= l.font_size || l.page_height - 2.0 * l.margin < l.font_size {
            return Err(ConvertError::InvalidConfig(format!(
                "Margin {} leaves no room for text on a {}×{} page",
                l.margin, l.page_width, l.page_height
            )));
        }
        Ok(self.config)
    }
}
