//! File formats, the capability table, and the validators guarding it.
//!
//! The capability table is the single source of truth for *which*
//! conversions are offered. Whether a pair is actually wired to a strategy
//! is a separate question answered by [`crate::routing::RoutingTable`]; a
//! pair advertised here but never routed surfaces as
//! [`ConvertError::NotImplemented`] rather than a silent no-op.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Closed set of extension tags the converter understands.
///
/// Identity is the tag alone: `jpg` and `jpeg` are distinct tags that the
/// validators treat as aliases of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    // Documents
    Pdf,
    Docx,
    Txt,
    // Images
    Png,
    Jpg,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
    // Audio
    Mp3,
    Wav,
    Ogg,
    Aac,
    M4a,
    Flac,
    // Video
    Mp4,
    Webm,
    Avi,
    Mov,
    Mkv,
    Flv,
}

/// Broad family a format belongs to; drives routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatCategory {
    Document,
    Image,
    Audio,
    Video,
}

impl FileFormat {
    /// Every tag, in declaration order.
    pub const ALL: [FileFormat; 22] = [
        FileFormat::Pdf,
        FileFormat::Docx,
        FileFormat::Txt,
        FileFormat::Png,
        FileFormat::Jpg,
        FileFormat::Jpeg,
        FileFormat::Webp,
        FileFormat::Gif,
        FileFormat::Bmp,
        FileFormat::Tiff,
        FileFormat::Mp3,
        FileFormat::Wav,
        FileFormat::Ogg,
        FileFormat::Aac,
        FileFormat::M4a,
        FileFormat::Flac,
        FileFormat::Mp4,
        FileFormat::Webm,
        FileFormat::Avi,
        FileFormat::Mov,
        FileFormat::Mkv,
        FileFormat::Flv,
    ];

    /// The extension tag, lowercase, without a dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Flac => "flac",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Flv => "flv",
        }
    }

    /// MIME type attached to output artifacts of this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Txt => "text/plain",
            Self::Png => "image/png",
            Self::Jpg | Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Aac => "audio/aac",
            Self::M4a => "audio/mp4",
            Self::Flac => "audio/flac",
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
            Self::Avi => "video/x-msvideo",
            Self::Mov => "video/quicktime",
            Self::Mkv => "video/x-matroska",
            Self::Flv => "video/x-flv",
        }
    }

    pub fn category(&self) -> FormatCategory {
        match self {
            Self::Pdf | Self::Docx | Self::Txt => FormatCategory::Document,
            Self::Png
            | Self::Jpg
            | Self::Jpeg
            | Self::Webp
            | Self::Gif
            | Self::Bmp
            | Self::Tiff => FormatCategory::Image,
            Self::Mp3 | Self::Wav | Self::Ogg | Self::Aac | Self::M4a | Self::Flac => {
                FormatCategory::Audio
            }
            Self::Mp4 | Self::Webm | Self::Avi | Self::Mov | Self::Mkv | Self::Flv => {
                FormatCategory::Video
            }
        }
    }

    pub fn is_image(&self) -> bool {
        self.category() == FormatCategory::Image
    }

    pub fn is_audio(&self) -> bool {
        self.category() == FormatCategory::Audio
    }

    pub fn is_video(&self) -> bool {
        self.category() == FormatCategory::Video
    }

    /// JPEG family: no alpha channel, needs compositing onto white.
    pub fn is_jpeg(&self) -> bool {
        matches!(self, Self::Jpg | Self::Jpeg)
    }

    /// Whether two tags name the same on-disk encoding (`jpg` ≡ `jpeg`).
    pub fn is_alias_of(&self, other: FileFormat) -> bool {
        *self == other || (self.is_jpeg() && other.is_jpeg())
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().trim_start_matches('.').to_ascii_lowercase();
        let tag = if tag == "tif" { "tiff".to_string() } else { tag };
        FileFormat::ALL
            .iter()
            .copied()
            .find(|f| f.extension() == tag)
            .ok_or(ConvertError::UnknownFormat { file_name: s.to_string() })
    }
}

// ── Capability table ─────────────────────────────────────────────────────

use FileFormat::*;

/// Reachable targets per source format. Immutable, process-wide.
pub static CAPABILITIES: &[(FileFormat, &[FileFormat])] = &[
    (Pdf, &[Txt, Docx, Png, Jpg]),
    (Docx, &[Pdf, Txt]),
    (Txt, &[Pdf, Docx]),
    (Png, &[Jpg, Webp, Gif, Bmp, Tiff, Pdf, Txt]),
    (Jpg, &[Png, Webp, Gif, Bmp, Tiff, Pdf, Txt]),
    (Jpeg, &[Png, Webp, Gif, Bmp, Tiff, Pdf, Txt]),
    (Webp, &[Png, Jpg, Gif, Bmp, Pdf, Txt]),
    (Gif, &[Png, Jpg, Webp, Bmp, Pdf]),
    (Bmp, &[Png, Jpg, Webp, Pdf, Txt]),
    (Tiff, &[Png, Jpg, Pdf, Txt]),
    (Mp3, &[Wav, Ogg, Aac, M4a, Flac]),
    (Wav, &[Mp3, Ogg, Aac, M4a, Flac]),
    (Ogg, &[Mp3, Wav, Aac, Flac]),
    (Aac, &[Mp3, Wav, Ogg, M4a]),
    (M4a, &[Mp3, Wav, Ogg, Aac]),
    (Flac, &[Mp3, Wav, Ogg, Aac, M4a]),
    (Mp4, &[Webm, Avi, Mov, Mkv, Flv, Mp3, Wav, Ogg, Aac]),
    (Webm, &[Mp4, Avi, Mov, Mkv, Mp3, Wav, Ogg]),
    (Avi, &[Mp4, Webm, Mov, Mkv, Mp3, Wav]),
    (Mov, &[Mp4, Webm, Avi, Mkv, Mp3, Wav, Aac]),
    (Mkv, &[Mp4, Webm, Avi, Mov, Mp3, Wav]),
    (Flv, &[Mp4, Webm, Avi, Mp3]),
];

/// A capability table: source format → ordered reachable targets.
///
/// [`CapabilityTable::standard`] wraps [`CAPABILITIES`]; embedders can build
/// their own to narrow (or experimentally widen) what is offered.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityTable {
    entries: &'static [(FileFormat, &'static [FileFormat])],
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl CapabilityTable {
    pub const fn standard() -> Self {
        Self {
            entries: CAPABILITIES,
        }
    }

    pub const fn new(entries: &'static [(FileFormat, &'static [FileFormat])]) -> Self {
        Self { entries }
    }

    /// Targets reachable from `from`; empty when `from` is not a source.
    pub fn targets(&self, from: FileFormat) -> &'static [FileFormat] {
        self.entries
            .iter()
            .find(|(src, _)| *src == from)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn is_supported(&self, from: FileFormat, to: FileFormat) -> bool {
        self.targets(from).contains(&to)
    }

    /// Every advertised `(from, to)` pair, in table order.
    pub fn pairs(&self) -> impl Iterator<Item = (FileFormat, FileFormat)> + '_ {
        self.entries
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (*from, *to)))
    }

    pub fn sources(&self) -> impl Iterator<Item = FileFormat> + '_ {
        self.entries.iter().map(|(from, _)| *from)
    }
}

/// Whether the standard table offers `from → to`.
pub fn is_conversion_supported(from: FileFormat, to: FileFormat) -> bool {
    CapabilityTable::standard().is_supported(from, to)
}

// ── Validators ───────────────────────────────────────────────────────────

/// Raw lowercase extension of `file_name`, if any.
fn raw_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Detect a file's format from its extension, case-insensitively.
///
/// Returns `None` for unknown or missing extensions; callers must treat
/// that as a rejection, never as a default.
pub fn detect_format(file_name: &str) -> Option<FileFormat> {
    raw_extension(file_name).and_then(|ext| ext.parse().ok())
}

/// Fail unless the file's real extension agrees with `declared`.
///
/// `jpg` and `jpeg` are accepted for each other. Guards against a caller
/// declaring a format to reach a code path the file cannot satisfy.
pub fn assert_file_matches_declared_format(
    file_name: &str,
    declared: FileFormat,
) -> Result<(), ConvertError> {
    match detect_format(file_name) {
        Some(actual) if actual.is_alias_of(declared) => Ok(()),
        Some(actual) => Err(ConvertError::FormatMismatch {
            file_name: file_name.to_string(),
            declared,
            actual: actual.to_string(),
        }),
        None => Err(ConvertError::FormatMismatch {
            file_name: file_name.to_string(),
            declared,
            actual: raw_extension(file_name).unwrap_or_else(|| "none".to_string()),
        }),
    }
}
