//! Default [`PdfEngine`] backed by pdfium.
//!
//! pdfium keeps thread-local state and `Pdfium` is `!Send`, so a fresh
//! binding is created per operation and every call is expected to run on a
//! blocking thread (`spawn_blocking`). The OS caches the `dlopen`, which
//! makes repeat bindings cheap.

use crate::backend::{PdfEngine, TextRun};
use crate::error::ConvertError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable naming the pdfium shared library explicitly.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// pdfium-backed PDF reader and rasteriser.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a specific library file instead of searching.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Bind to pdfium.
    ///
    /// Discovery order:
    /// 1. the explicit library path, if configured
    /// 2. `PDFIUM_DYNAMIC_LIB_PATH`
    /// 3. next to the running executable
    /// 4. system library search paths
    fn bind(&self) -> Result<Pdfium, ConvertError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));
        if let Some(path) = explicit {
            debug!("Binding pdfium from {}", path.display());
            let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
                ConvertError::PdfEngineUnavailable(format!("{}: {e}", path.display()))
            })?;
            return Ok(Pdfium::new(bindings));
        }

        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            let lib = Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
                debug!("Bound pdfium next to executable: {}", dir.display());
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| ConvertError::PdfEngineUnavailable(e.to_string()))?;
        Ok(Pdfium::new(bindings))
    }
}

/// Map a document load failure, calling out encrypted files.
fn map_load_error(e: PdfiumError) -> ConvertError {
    let msg = format!("{e:?}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") || lower.contains("security") {
        ConvertError::decode("PDF", "the document is password-protected")
    } else {
        ConvertError::decode("PDF", msg)
    }
}

fn page_error(idx: usize, e: PdfiumError) -> ConvertError {
    ConvertError::decode(format!("PDF page {}", idx + 1), format!("{e:?}"))
}

impl PdfEngine for PdfiumEngine {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ConvertError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ConvertError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(map_load_error)?;
        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut out = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| page_error(idx, e))?;
            out.push(text.all());
        }
        Ok(out)
    }

    fn extract_runs(&self, pdf: &[u8]) -> Result<Vec<Vec<TextRun>>, ConvertError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(map_load_error)?;

        let mut out = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let text = page.text().map_err(|e| page_error(idx, e))?;
            let runs: Vec<TextRun> = text
                .segments()
                .iter()
                .map(|segment| {
                    let bounds = segment.bounds();
                    TextRun {
                        text: segment.text(),
                        x: bounds.left().value,
                        y: bounds.bottom().value,
                        width: bounds.width().value,
                    }
                })
                .collect();
            debug!("Page {}: {} text runs", idx + 1, runs.len());
            out.push(runs);
        }
        Ok(out)
    }

    fn render_pages(
        &self,
        pdf: &[u8],
        max_pages: usize,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, ConvertError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(map_load_error)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut images = Vec::new();
        for (idx, page) in document.pages().iter().enumerate().take(max_pages) {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| page_error(idx, e))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}
