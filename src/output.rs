//! Conversion output types.

use crate::format::FileFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A produced artifact.
///
/// `format` is the format actually produced. It differs from the requested
/// target only when the audio fast path had to substitute WAV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutput {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: FileFormat,
    pub mime_type: String,
    /// Original base name with the produced format's extension.
    pub file_name: String,
}

impl ConversionOutput {
    pub fn new(bytes: Vec<u8>, format: FileFormat, original_name: &str) -> Self {
        Self {
            bytes,
            format,
            mime_type: format.mime_type().to_string(),
            file_name: output_file_name(original_name, format),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The output decoded as UTF-8, for text targets.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Replace the extension of `original_name` with `format`'s.
///
/// Directory components are dropped: `a/b/report.pdf` → `report.txt`.
pub fn output_file_name(original_name: &str, format: FileFormat) -> String {
    let path = Path::new(original_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("converted");
    format!("{stem}.{}", format.extension())
}
