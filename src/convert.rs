//! Conversion dispatcher and convenience entry points.
//!
//! [`Converter`] owns everything one conversion needs: the capability
//! table, the routing map derived from it, the PDF engine, the OCR
//! pipeline and the media strategy (with its lazily-loaded transcoder).
//! Build one and reuse it; the free functions below build a throwaway
//! converter per call, which also means a fresh transcoder load.
//!
//! ## Dispatch order
//!
//! 1. pair not in the capability table → `UnsupportedConversion`
//! 2. file extension contradicts the declared source → `FormatMismatch`
//! 3. routing map → strategy
//! 4. pair advertised but unrouted → `NotImplemented`
//!
//! Any failure leaves as a [`ConversionError`] naming the requested pair.

use crate::backend::{
    CredentialProvider, EnvCredentials, NativeAudioCodec, PdfEngine, Recognizer, TranscoderLoader,
};
use crate::config::{ConversionConfig, LayoutConfig};
use crate::document;
use crate::error::{ConversionError, ConvertError};
use crate::format::{assert_file_matches_declared_format, CapabilityTable, FileFormat};
use crate::input::{resolve_input, InputFile};
use crate::media::ffmpeg::FfmpegLoader;
use crate::media::native::SymphoniaCodec;
use crate::media::{MediaStrategy, TranscoderHandle};
use crate::ocr::remote::RemoteRecognizer;
use crate::ocr::tesseract::TesseractRecognizer;
use crate::ocr::OcrPipeline;
use crate::output::ConversionOutput;
use crate::pdfium::PdfiumEngine;
use crate::progress::{report, ConversionStage, ProgressCallback};
use crate::raster;
use crate::routing::{Route, RoutingTable};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Routes validated conversions to their strategies.
pub struct Converter {
    capabilities: CapabilityTable,
    routes: RoutingTable,
    pdf: Arc<dyn PdfEngine>,
    ocr: OcrPipeline,
    media: MediaStrategy,
    layout: LayoutConfig,
    pdf_ocr_fallback: bool,
    pdf_render_scale: f32,
    progress: Option<ProgressCallback>,
}

impl Converter {
    /// Converter over the standard capability table.
    pub fn new(config: ConversionConfig) -> Result<Self, ConvertError> {
        Self::with_capabilities(config, CapabilityTable::standard())
    }

    /// Converter over a custom capability table.
    ///
    /// Pairs the table advertises that no strategy can serve are logged
    /// now and answer `NotImplemented` when requested.
    pub fn with_capabilities(
        config: ConversionConfig,
        capabilities: CapabilityTable,
    ) -> Result<Self, ConvertError> {
        let routes = RoutingTable::build(&capabilities);
        if !routes.unrouted().is_empty() {
            warn!(
                "{} advertised conversion(s) have no strategy",
                routes.unrouted().len()
            );
        }

        let ConversionConfig {
            ocr,
            media,
            layout,
            pdf_ocr_fallback,
            pdf_render_scale,
            download_timeout_secs: _,
            pdf_engine,
            primary_recognizer,
            fallback_recognizer,
            transcoder_loader,
            audio_codec,
            credentials,
            progress_callback,
        } = config;

        let pdf: Arc<dyn PdfEngine> = match pdf_engine {
            Some(engine) => engine,
            None => Arc::new(PdfiumEngine::new()),
        };

        let primary: Arc<dyn Recognizer> = match primary_recognizer {
            Some(r) => r,
            None => {
                let credentials: Arc<dyn CredentialProvider> = match credentials {
                    Some(c) => c,
                    None => Arc::new(EnvCredentials),
                };
                Arc::new(RemoteRecognizer::new(
                    ocr.endpoint.clone(),
                    credentials,
                    Duration::from_secs(ocr.request_timeout_secs),
                )?)
            }
        };
        let fallback: Arc<dyn Recognizer> = match fallback_recognizer {
            Some(r) => r,
            None => Arc::new(match ocr.tesseract_path {
                Some(ref path) => TesseractRecognizer::with_binary(path),
                None => TesseractRecognizer::new(),
            }),
        };

        let loader: Arc<dyn TranscoderLoader> = match transcoder_loader {
            Some(l) => l,
            None => Arc::new(FfmpegLoader::new(media.ffmpeg_path.clone())),
        };
        let codec: Arc<dyn NativeAudioCodec> = match audio_codec {
            Some(c) => c,
            None => Arc::new(SymphoniaCodec::new()),
        };

        debug!(
            "Converter ready: {} routes, OCR '{}' → '{}'",
            routes.len(),
            primary.name(),
            fallback.name()
        );

        Ok(Self {
            capabilities,
            routes,
            pdf,
            ocr: OcrPipeline::new(primary, fallback, ocr, progress_callback.clone()),
            media: MediaStrategy::new(
                TranscoderHandle::new(loader),
                codec,
                media.native_audio,
                progress_callback.clone(),
            ),
            layout,
            pdf_ocr_fallback,
            pdf_render_scale,
            progress: progress_callback,
        })
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// The shared transcoder handle.
    pub fn transcoder(&self) -> &TranscoderHandle {
        self.media.transcoder()
    }

    /// Fail unless the capability table offers `source → target`.
    pub fn check_pair(&self, source: FileFormat, target: FileFormat) -> Result<(), ConvertError> {
        if self.capabilities.is_supported(source, target) {
            Ok(())
        } else {
            Err(ConvertError::UnsupportedConversion {
                from: source,
                to: target,
            })
        }
    }

    /// Convert `file`, declared as `source`, to `target`.
    pub async fn convert_file(
        &self,
        file: &InputFile,
        source: FileFormat,
        target: FileFormat,
    ) -> Result<ConversionOutput, ConversionError> {
        let start = Instant::now();
        match self.dispatch(file, source, target).await {
            Ok(output) => {
                info!(
                    "Converted {} ({} → {}): {} bytes in {}ms",
                    file.name,
                    source,
                    output.format,
                    output.len(),
                    start.elapsed().as_millis()
                );
                report(self.progress.as_ref(), ConversionStage::Done);
                if let Some(ref cb) = self.progress {
                    cb.on_conversion_complete(output.format, output.len());
                }
                Ok(output)
            }
            Err(kind) => {
                let error = ConversionError::new(source, target, kind);
                warn!("{}", error);
                report(self.progress.as_ref(), ConversionStage::Failed);
                if let Some(ref cb) = self.progress {
                    cb.on_conversion_error(&error.to_string());
                }
                Err(error)
            }
        }
    }

    async fn dispatch(
        &self,
        file: &InputFile,
        source: FileFormat,
        target: FileFormat,
    ) -> Result<ConversionOutput, ConvertError> {
        report(self.progress.as_ref(), ConversionStage::Validating);
        self.check_pair(source, target)?;
        assert_file_matches_declared_format(&file.name, source)?;

        let route = self
            .routes
            .route(source, target)
            .ok_or(ConvertError::NotImplemented {
                from: source,
                to: target,
            })?;

        debug!("{} → {} via {}", source, target, route);
        if let Some(ref cb) = self.progress {
            cb.on_conversion_start(source, target);
        }

        let (bytes, produced) = self.run(route, file, source, target).await?;
        Ok(ConversionOutput::new(bytes, produced, &file.name))
    }

    /// Execute one route. Returns the bytes and the format actually produced.
    async fn run(
        &self,
        route: Route,
        file: &InputFile,
        source: FileFormat,
        target: FileFormat,
    ) -> Result<(Vec<u8>, FileFormat), ConvertError> {
        let stage = |s| report(self.progress.as_ref(), s);
        let bytes = file.bytes.clone();

        let out = match route {
            Route::ImageToImage => {
                stage(ConversionStage::Decoding);
                raster::convert_image(bytes, target).await?
            }
            Route::ImageToPdf => {
                stage(ConversionStage::Decoding);
                raster::image_to_pdf(bytes, source).await?
            }
            Route::ImageOcr => self.ocr.recognize_image(bytes).await?.text.into_bytes(),
            Route::PdfToText if self.pdf_ocr_fallback => {
                self.ocr.recognize_pdf(&self.pdf, bytes).await?.text.into_bytes()
            }
            Route::PdfToText => {
                stage(ConversionStage::Decoding);
                document::pdf_to_text(&self.pdf, bytes).await?.into_bytes()
            }
            Route::PdfToDocx => {
                stage(ConversionStage::Decoding);
                document::pdf_to_docx(&self.pdf, bytes).await?
            }
            Route::PdfToImage => {
                stage(ConversionStage::Decoding);
                document::pdf_to_image(&self.pdf, bytes, target, self.pdf_render_scale).await?
            }
            Route::TextToPdf => {
                stage(ConversionStage::Encoding);
                document::text_to_pdf(bytes, self.layout).await?
            }
            Route::TextToDocx => {
                stage(ConversionStage::Encoding);
                document::text_to_docx(&bytes)?
            }
            Route::DocxToPdf => {
                stage(ConversionStage::Decoding);
                document::docx_to_pdf(bytes, self.layout).await?
            }
            Route::DocxToText => {
                stage(ConversionStage::Decoding);
                document::docx_to_text(bytes).await?.into_bytes()
            }
            Route::Audio | Route::Video => {
                let out = self
                    .media
                    .convert(&file.bytes, &file.name, source, target)
                    .await?;
                return Ok((out.bytes, out.format));
            }
        };
        Ok((out, target))
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Convert a local file or HTTP(S) URL.
///
/// The pair is checked before anything is read or downloaded.
///
/// # Example
/// ```rust,no_run
/// use edgequake_fileconv::{convert, ConversionConfig, FileFormat};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let output = convert("report.docx", FileFormat::Docx, FileFormat::Pdf, &config).await?;
/// std::fs::write(&output.file_name, &output.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input: impl AsRef<str>,
    source: FileFormat,
    target: FileFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConversionError> {
    let wrap = |kind| ConversionError::new(source, target, kind);
    let converter = Converter::new(config.clone()).map_err(wrap)?;
    converter.check_pair(source, target).map_err(wrap)?;
    let file = resolve_input(input.as_ref(), config.download_timeout_secs)
        .await
        .map_err(wrap)?;
    converter.convert_file(&file, source, target).await
}

/// Convert in-memory bytes; `name` supplies the extension checked against
/// `source`.
pub async fn convert_bytes(
    bytes: Vec<u8>,
    name: &str,
    source: FileFormat,
    target: FileFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConversionError> {
    let converter = Converter::new(config.clone())
        .map_err(|kind| ConversionError::new(source, target, kind))?;
    converter
        .convert_file(&InputFile::new(name, bytes), source, target)
        .await
}

/// Convert and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input: impl AsRef<str>,
    source: FileFormat,
    target: FileFormat,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConversionError> {
    let output = convert(input, source, target, config).await?;
    write_atomic(output_path.as_ref(), &output.bytes)
        .await
        .map_err(|kind| ConversionError::new(source, target, kind))?;
    Ok(output)
}

/// Write `bytes` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let write_err = |source| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<str>,
    source: FileFormat,
    target: FileFormat,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConversionError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            ConversionError::new(
                source,
                target,
                ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)),
            )
        })?
        .block_on(convert(input, source, target, config))
}
