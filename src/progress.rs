//! Progress-callback trait for conversion stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow a
//! conversion as it moves through its stages. The CLI drives its spinner
//! from these events; a UI would drive a [`crate::job::ConversionJob`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_fileconv::{ConversionConfig, ConversionProgressCallback, ConversionStage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage(&self, stage: &ConversionStage) {
//!         eprintln!("→ {}", stage);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::format::FileFormat;
use std::fmt;
use std::sync::Arc;

/// A step inside one conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionStage {
    /// Capability and extension checks.
    Validating,
    /// Parsing the input (image decode, PDF load, DOCX unzip).
    Decoding,
    /// OCR raster clean-up (contrast, threshold, sharpen).
    Preprocessing,
    /// Remote recognition; `attempt` is 1-based.
    PrimaryRecognition { attempt: u32 },
    /// Local recognition after the remote one was skipped or exhausted.
    FallbackRecognition,
    /// OCR text clean-up.
    PostProcessing,
    /// Rendering PDF page `page` of `total` for OCR.
    RenderingPage { page: usize, total: usize },
    /// Loading the media transcoder (first media conversion only).
    LoadingTranscoder,
    Transcoding,
    /// In-process audio decode/encode.
    NativeAudio,
    /// Producing the output bytes.
    Encoding,
    Done,
    Failed,
}

impl ConversionStage {
    /// Rough completion fraction, for progress bars.
    pub fn fraction(&self) -> f32 {
        match self {
            Self::Validating => 0.05,
            Self::Decoding => 0.15,
            Self::Preprocessing => 0.25,
            Self::LoadingTranscoder => 0.2,
            Self::PrimaryRecognition { .. } | Self::Transcoding | Self::NativeAudio => 0.5,
            Self::RenderingPage { page, total } => {
                0.2 + 0.5 * (*page as f32 / (*total).max(1) as f32)
            }
            Self::FallbackRecognition => 0.6,
            Self::PostProcessing | Self::Encoding => 0.9,
            Self::Done | Self::Failed => 1.0,
        }
    }
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => write!(f, "validating"),
            Self::Decoding => write!(f, "decoding"),
            Self::Preprocessing => write!(f, "preprocessing image"),
            Self::PrimaryRecognition { attempt } => {
                write!(f, "remote text recognition (attempt {attempt})")
            }
            Self::FallbackRecognition => write!(f, "local text recognition"),
            Self::PostProcessing => write!(f, "cleaning recognized text"),
            Self::RenderingPage { page, total } => write!(f, "rendering page {page}/{total}"),
            Self::LoadingTranscoder => write!(f, "loading transcoder"),
            Self::Transcoding => write!(f, "transcoding"),
            Self::NativeAudio => write!(f, "converting audio"),
            Self::Encoding => write!(f, "encoding"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Called by the converter as a conversion progresses.
///
/// Implementations must be `Send + Sync`: one [`crate::Converter`] may
/// serve several conversions at once. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once validation has passed and a strategy is about to run.
    fn on_conversion_start(&self, source: FileFormat, target: FileFormat) {
        let _ = (source, target);
    }

    /// Called on every stage transition.
    fn on_stage(&self, stage: &ConversionStage) {
        let _ = stage;
    }

    /// Called once the output exists.
    ///
    /// # Arguments
    /// * `format`     — format actually produced
    /// * `output_len` — byte length of the output
    fn on_conversion_complete(&self, format: FileFormat, output_len: usize) {
        let _ = (format, output_len);
    }

    /// Called when the conversion fails, with the user-facing message.
    fn on_conversion_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Forward a stage to an optional callback.
pub(crate) fn report(cb: Option<&ProgressCallback>, stage: ConversionStage) {
    if let Some(cb) = cb {
        cb.on_stage(&stage);
    }
}
