//! Error types for the edgequake-fileconv library.
//!
//! Two layers reflect where a failure is observed:
//!
//! * [`ConvertError`] — the taxonomy itself. Validators and strategies
//!   return it; it says *what* went wrong (unsupported pair, corrupt input,
//!   missing transcoder, …) without knowing which conversion was running.
//!
//! * [`ConversionError`] — what the dispatcher hands back to callers. It
//!   wraps exactly one [`ConvertError`] and attaches the `(source, target)`
//!   pair that was requested. Strategies never build one, so the pair is
//!   attached once, at the dispatcher boundary.

use crate::format::FileFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure a conversion can produce.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Validation errors (raised before any strategy runs) ───────────────
    /// The pair is absent from the capability table.
    #[error("Conversion from {from} to {to} is not supported.\nRun `fileconv --list-formats` to see every supported pair.")]
    UnsupportedConversion { from: FileFormat, to: FileFormat },

    /// The declared source format contradicts the file's real extension.
    #[error("'{file_name}' was declared as {declared} but its extension is '{actual}'")]
    FormatMismatch {
        file_name: String,
        declared: FileFormat,
        actual: String,
    },

    /// The file's extension is not one of the known formats.
    #[error("Cannot detect the format of '{file_name}': unknown or missing extension")]
    UnknownFormat { file_name: String },

    /// The pair is advertised but no strategy is wired to it.
    #[error("Conversion from {from} to {to} is not implemented yet")]
    NotImplemented { from: FileFormat, to: FileFormat },

    // ── Strategy errors ───────────────────────────────────────────────────
    /// Input bytes could not be parsed (corrupt file, password, unsupported codec).
    #[error("Failed to decode {what}: {detail}")]
    DecodeFailure { what: String, detail: String },

    /// The requested output encoding could not be produced.
    #[error("Failed to encode {what}: {detail}")]
    EncodeFailure { what: String, detail: String },

    /// The media transcoder could not be loaded.
    #[error(
        "Media transcoder unavailable: {reason}\n\n\
Audio/video conversion needs an ffmpeg executable. To fix this:\n\
  • Install ffmpeg (e.g. `apt install ffmpeg`, `brew install ffmpeg`).\n\
  • Or point FILECONV_FFMPEG_PATH / --ffmpeg-path at an existing ffmpeg binary.\n\
  • Or convert to a format that does not need the transcoder (e.g. mp3 → wav).\n"
    )]
    TranscoderUnavailable { reason: String },

    /// The transcoder loaded but the transcode itself failed.
    #[error("Transcoding to {target} failed: {detail}")]
    TranscodeFailed { target: FileFormat, detail: String },

    /// PDF engine (pdfium) could not be bound.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF reading needs the pdfium shared library. You can:\n\
  • Set PDFIUM_DYNAMIC_LIB_PATH=/path/to/libpdfium.\n\
  • Place libpdfium next to the fileconv executable.\n\
  • Install pdfium into a system library path.\n"
    )]
    PdfEngineUnavailable(String),

    /// A recognizer failed, after `attempts` tries.
    ///
    /// Remote failures are recovered locally by the fallback recognizer; only
    /// [`ConvertError::FallbackExhausted`] reaches the caller.
    #[error("Text recognition failed after {attempts} attempt(s): {detail}")]
    RecognitionFailure { attempts: u32, detail: String },

    /// The local recognizer failed too; the only terminal OCR failure.
    #[error("Text recognition failed: {fallback}{}", primary_suffix(.primary))]
    FallbackExhausted {
        primary: Option<String>,
        fallback: String,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a readable path nor an HTTP(S) URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Output / config errors ────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure (temp files, reading a local input).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, temp file failure, …).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand for a [`ConvertError::DecodeFailure`].
    pub fn decode(what: impl Into<String>, detail: impl ToString) -> Self {
        Self::DecodeFailure {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    /// Shorthand for a [`ConvertError::EncodeFailure`].
    pub fn encode(what: impl Into<String>, detail: impl ToString) -> Self {
        Self::EncodeFailure {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Only transient network failures qualify; every strategy failure in
    /// the taxonomy is terminal for the call that raised it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConvertError::RecognitionFailure { .. } | ConvertError::DownloadTimeout { .. }
        )
    }

    /// Whether this error was raised by validation, before any strategy ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConvertError::UnsupportedConversion { .. }
                | ConvertError::FormatMismatch { .. }
                | ConvertError::UnknownFormat { .. }
        )
    }
}

fn primary_suffix(primary: &Option<String>) -> String {
    primary
        .as_ref()
        .map(|p| format!(" (primary: {p})"))
        .unwrap_or_default()
}

/// The single error type returned by the dispatcher.
///
/// Carries the requested `(source, target)` pair plus the underlying
/// [`ConvertError`], whose message is preserved verbatim.
#[derive(Debug, Error)]
#[error("Cannot convert {source_format} → {target_format}: {kind}")]
pub struct ConversionError {
    pub source_format: FileFormat,
    pub target_format: FileFormat,
    #[source]
    pub kind: ConvertError,
}

impl ConversionError {
    pub fn new(source_format: FileFormat, target_format: FileFormat, kind: ConvertError) -> Self {
        Self {
            source_format,
            target_format,
            kind,
        }
    }

    /// The underlying error kind.
    pub fn kind(&self) -> &ConvertError {
        &self.kind
    }
}
