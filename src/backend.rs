//! Capability providers: the engines the strategies drive.
//!
//! Every third-party engine (pdfium, ffmpeg, tesseract, symphonia/hound, the
//! remote OCR service) sits behind one of the traits below, so that
//! [`crate::config::ConversionConfigBuilder`] can inject alternatives and the
//! integration tests can substitute recording mocks.
//!
//! Blocking engines ([`PdfEngine`], [`NativeAudioCodec`]) expose synchronous
//! methods; callers move them onto `spawn_blocking`. Network- or
//! process-bound engines are `async`.

use crate::error::ConvertError;
use crate::format::FileFormat;
use crate::ocr::OcrResult;
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;

// ── PDF ──────────────────────────────────────────────────────────────────

/// One positioned piece of text on a PDF page.
///
/// Coordinates are PDF points with the origin at the bottom-left of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// Reads and rasterises PDFs.
pub trait PdfEngine: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ConvertError>;

    /// Plain text of every page, in page order. Pages without a text layer
    /// yield an empty string.
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ConvertError>;

    /// Positioned text runs of every page, in page order.
    fn extract_runs(&self, pdf: &[u8]) -> Result<Vec<Vec<TextRun>>, ConvertError>;

    /// Render the first `max_pages` pages at `scale` × their natural size.
    fn render_pages(
        &self,
        pdf: &[u8],
        max_pages: usize,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, ConvertError>;
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Per-call recognition parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeOptions {
    /// Tesseract-style language code, e.g. `eng`.
    pub language: String,
    pub preserve_layout: bool,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            preserve_layout: false,
        }
    }
}

/// Turns a PNG-encoded raster into text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short identifier used in logs and [`OcrResult::engine`].
    fn name(&self) -> &str;

    /// Whether this recognizer can be attempted at all right now.
    ///
    /// The remote recognizer answers `false` when no credential is stored,
    /// which routes recognition straight to the local fallback.
    fn is_available(&self) -> bool {
        true
    }

    async fn recognize(
        &self,
        png: &[u8],
        options: &RecognizeOptions,
    ) -> Result<OcrResult, ConvertError>;
}

/// Supplies the remote OCR credential on demand.
pub trait CredentialProvider: Send + Sync {
    fn ocr_api_key(&self) -> Option<String>;
}

/// Reads the OCR API key from `FILECONV_OCR_API_KEY`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

/// Environment variable consulted by [`EnvCredentials`].
pub const OCR_API_KEY_ENV: &str = "FILECONV_OCR_API_KEY";

impl CredentialProvider for EnvCredentials {
    fn ocr_api_key(&self) -> Option<String> {
        std::env::var(OCR_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// A fixed credential, e.g. from `--ocr-api-key`.
#[derive(Clone, Default)]
pub struct StaticCredentials(pub Option<String>);

impl CredentialProvider for StaticCredentials {
    fn ocr_api_key(&self) -> Option<String> {
        self.0.clone().filter(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticCredentials")
            .field(&self.0.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ── Media ────────────────────────────────────────────────────────────────

/// A loaded media transcoder.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` to `target`.
    ///
    /// `input_name` is the original file name; its extension lets the
    /// transcoder pick a demuxer.
    async fn transcode(
        &self,
        input: &[u8],
        input_name: &str,
        target: FileFormat,
    ) -> Result<Vec<u8>, ConvertError>;
}

/// Produces the transcoder. Called at most once per successful load.
#[async_trait]
pub trait TranscoderLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Transcoder>, ConvertError>;
}

/// Interleaved 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmAudio {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

/// In-process audio decode/encode used by the fast path.
pub trait NativeAudioCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], source: FileFormat) -> Result<PcmAudio, ConvertError>;

    /// Whether [`NativeAudioCodec::encode`] can produce `target`.
    fn supports_encoding(&self, target: FileFormat) -> bool;

    fn encode(&self, audio: &PcmAudio, target: FileFormat) -> Result<Vec<u8>, ConvertError>;
}
