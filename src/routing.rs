//! Routing map: which strategy operation serves each `(source, target)` pair.
//!
//! The map is derived once from a [`CapabilityTable`] by offering every
//! advertised pair to an ordered rule list (documents, images, OCR, audio,
//! video). The first rule that claims a pair owns it. Pairs no rule claims
//! are reported at construction and answer
//! [`crate::ConvertError::NotImplemented`] at dispatch time.

use crate::format::{CapabilityTable, FileFormat, FormatCategory};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// A strategy operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    PdfToText,
    PdfToDocx,
    PdfToImage,
    TextToPdf,
    TextToDocx,
    DocxToPdf,
    DocxToText,
    ImageToImage,
    ImageToPdf,
    ImageOcr,
    Audio,
    Video,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::PdfToText => "pdf-to-text",
            Route::PdfToDocx => "pdf-to-docx",
            Route::PdfToImage => "pdf-to-image",
            Route::TextToPdf => "text-to-pdf",
            Route::TextToDocx => "text-to-docx",
            Route::DocxToPdf => "docx-to-pdf",
            Route::DocxToText => "docx-to-text",
            Route::ImageToImage => "image",
            Route::ImageToPdf => "image-to-pdf",
            Route::ImageOcr => "ocr",
            Route::Audio => "audio",
            Route::Video => "video",
        };
        f.write_str(name)
    }
}

type Rule = fn(FileFormat, FileFormat) -> Option<Route>;

fn document_rule(from: FileFormat, to: FileFormat) -> Option<Route> {
    use FileFormat::*;
    match (from, to) {
        (Pdf, Txt) => Some(Route::PdfToText),
        (Pdf, Docx) => Some(Route::PdfToDocx),
        (Pdf, t) if t.is_image() => Some(Route::PdfToImage),
        (Txt, Pdf) => Some(Route::TextToPdf),
        (Txt, Docx) => Some(Route::TextToDocx),
        (Docx, Pdf) => Some(Route::DocxToPdf),
        (Docx, Txt) => Some(Route::DocxToText),
        _ => None,
    }
}

fn image_rule(from: FileFormat, to: FileFormat) -> Option<Route> {
    if !from.is_image() {
        return None;
    }
    if to.is_image() {
        Some(Route::ImageToImage)
    } else if to == FileFormat::Pdf {
        Some(Route::ImageToPdf)
    } else {
        None
    }
}

fn ocr_rule(from: FileFormat, to: FileFormat) -> Option<Route> {
    (from.is_image() && to == FileFormat::Txt).then_some(Route::ImageOcr)
}

fn audio_rule(from: FileFormat, to: FileFormat) -> Option<Route> {
    (from.is_audio() && to.is_audio()).then_some(Route::Audio)
}

fn video_rule(from: FileFormat, to: FileFormat) -> Option<Route> {
    (from.is_video() && matches!(to.category(), FormatCategory::Video | FormatCategory::Audio))
        .then_some(Route::Video)
}

/// Rules in priority order.
const RULES: &[(&str, Rule)] = &[
    ("document", document_rule),
    ("image", image_rule),
    ("ocr", ocr_rule),
    ("audio", audio_rule),
    ("video", video_rule),
];

/// `(source, target) → Route`, checked against a capability table.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<(FileFormat, FileFormat), Route>,
    unrouted: Vec<(FileFormat, FileFormat)>,
}

impl RoutingTable {
    /// Route every pair `capabilities` advertises.
    pub fn build(capabilities: &CapabilityTable) -> Self {
        let mut routes = HashMap::new();
        let mut unrouted = Vec::new();

        for (from, to) in capabilities.pairs() {
            let claimed = RULES
                .iter()
                .find_map(|(name, rule)| rule(from, to).map(|route| (*name, route)));
            match claimed {
                Some((rule, route)) => {
                    debug!("route {} → {}: {} ({} rule)", from, to, route, rule);
                    routes.insert((from, to), route);
                }
                None => {
                    warn!("Capability {} → {} has no conversion route", from, to);
                    unrouted.push((from, to));
                }
            }
        }

        Self { routes, unrouted }
    }

    pub fn route(&self, from: FileFormat, to: FileFormat) -> Option<Route> {
        self.routes.get(&(from, to)).copied()
    }

    /// Advertised pairs that no rule claimed, in table order.
    pub fn unrouted(&self) -> &[(FileFormat, FileFormat)] {
        &self.unrouted
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::build(&CapabilityTable::standard())
    }
}
