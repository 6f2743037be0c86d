//! # edgequake-fileconv
//!
//! Convert documents, images, audio and video between formats.
//!
//! ## Why this crate?
//!
//! Everyday conversions (a scan to PDF, a DOCX to text, a clip to mp3) each
//! need a different engine, and each engine fails in its own way. This crate
//! puts them behind one call with one error type: a fixed capability table
//! says what is offered, validators refuse bad requests before any bytes are
//! touched, and a routing map hands the rest to the right strategy.
//!
//! ## Strategies
//!
//! ```text
//! InputFile + (source, target)
//!  │
//!  ├─ validate   capability table, extension vs. declared format
//!  ├─ route      (source, target) → strategy
//!  │
//!  ├─ image      decode → RGBA → re-encode, or embed in a one-page PDF
//!  ├─ document   PDF text/DOCX/image, text/DOCX → PDF (Helvetica layout)
//!  ├─ OCR        preprocess → remote (retried) → tesseract → clean-up
//!  └─ media      mp3↔wav in-process, everything else through ffmpeg
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_fileconv::{ConversionConfig, Converter, FileFormat, InputFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::default())?;
//!     let file = InputFile::from_path("scan.jpg").await?;
//!     let output = converter
//!         .convert_file(&file, FileFormat::Jpg, FileFormat::Pdf)
//!         .await?;
//!     std::fs::write(&output.file_name, &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime requirements
//!
//! | Conversions | Needs |
//! |-------------|-------|
//! | anything reading a PDF | the pdfium shared library (`PDFIUM_DYNAMIC_LIB_PATH`) |
//! | image → txt | a remote OCR endpoint and key, or `tesseract` on `PATH` |
//! | audio/video (except mp3 ↔ wav) | `ffmpeg` on `PATH` or `FILECONV_FFMPEG_PATH` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fileconv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-fileconv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod fallback;
pub mod format;
pub mod input;
pub mod job;
pub mod media;
pub mod ocr;
pub mod output;
pub mod pdfium;
pub mod progress;
pub mod raster;
pub mod retry;
pub mod routing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{
    CredentialProvider, EnvCredentials, NativeAudioCodec, PcmAudio, PdfEngine, RecognizeOptions,
    Recognizer, StaticCredentials, TextRun, Transcoder, TranscoderLoader,
};
pub use config::{ConversionConfig, ConversionConfigBuilder, LayoutConfig, MediaConfig, OcrConfig};
pub use convert::{convert, convert_bytes, convert_sync, convert_to_file, Converter};
pub use error::{ConversionError, ConvertError};
pub use fallback::{FallbackChain, FallbackExhausted, FallbackSuccess};
pub use format::{
    assert_file_matches_declared_format, detect_format, is_conversion_supported, CapabilityTable,
    FileFormat, FormatCategory, CAPABILITIES,
};
pub use input::InputFile;
pub use job::{ConversionJob, JobStatus};
pub use ocr::{BoundingBox, OcrResult, TextBlock};
pub use output::ConversionOutput;
pub use progress::{ConversionProgressCallback, ConversionStage, NoopProgressCallback};
pub use retry::RetryPolicy;
pub use routing::{Route, RoutingTable};
