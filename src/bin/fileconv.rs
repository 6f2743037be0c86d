//! CLI binary for edgequake-fileconv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_fileconv::convert::write_atomic;
use edgequake_fileconv::input::{extract_filename, is_url, resolve_input};
use edgequake_fileconv::progress::ProgressCallback;
use edgequake_fileconv::{
    detect_format, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    ConversionStage, ConvertError, Converter, FileFormat, FormatCategory, CAPABILITIES,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar whose position follows the conversion stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}]  {msg}  ⏱ {elapsed}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, source: FileFormat, target: FileFormat) {
        self.bar.set_prefix(format!("{source} → {target}"));
    }

    fn on_stage(&self, stage: &ConversionStage) {
        let pos = (stage.fraction() * 100.0) as u64;
        if pos > self.bar.position() {
            self.bar.set_position(pos);
        }
        if let ConversionStage::FallbackRecognition = stage {
            self.bar
                .println(format!("  {} remote OCR unavailable, using tesseract", cyan("⚠")));
        }
        self.bar.set_message(stage.to_string());
    }

    fn on_conversion_complete(&self, _format: FileFormat, _output_len: usize) {
        self.bar.finish_and_clear();
    }

    fn on_conversion_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Image to PDF (output: scan.pdf in the current directory)
  fileconv scan.jpg --to pdf

  # Scanned image to text through OCR
  fileconv receipt.png --to txt -o receipt.txt

  # Image-only PDF to text, recognizing pages when there is no text layer
  fileconv scanned.pdf --to txt --pdf-ocr

  # Video to audio
  fileconv clip.mp4 --to mp3

  # Remote input, explicit source format, output to stdout
  fileconv https://example.com/report --from docx --to txt -o -

  # Every supported pair
  fileconv --list-formats

ENVIRONMENT VARIABLES:
  FILECONV_OCR_ENDPOINT    Base URL of the remote OCR service
  FILECONV_OCR_API_KEY     API key for the remote OCR service
  FILECONV_FFMPEG_PATH     ffmpeg executable (default: ffmpeg on PATH)
  FILECONV_TESSERACT_PATH  tesseract executable (default: tesseract on PATH)
  PDFIUM_DYNAMIC_LIB_PATH  pdfium shared library for reading PDFs
  RUST_LOG                 Log filter, overrides -v / -q

Without an OCR endpoint and key, image → txt goes straight to tesseract.
"#;

/// Convert documents, images, audio and video between formats.
#[derive(Parser, Debug)]
#[command(
    name = "fileconv",
    version,
    about = "Convert documents, images, audio and video between formats",
    long_about = "Convert files between document (pdf, docx, txt), image (png, jpg, webp, gif, \
bmp, tiff), audio (mp3, wav, ogg, aac, m4a, flac) and video (mp4, webm, avi, mov, mkv, flv) \
formats. Images convert to text through OCR; audio and video go through ffmpeg.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "list_formats")]
    input: Option<String>,

    /// Target format (e.g. pdf, txt, png, mp3).
    #[arg(long, required_unless_present = "list_formats")]
    to: Option<FileFormat>,

    /// Source format. Default: detected from the file extension.
    #[arg(long)]
    from: Option<FileFormat>,

    /// Output path; `-` writes to stdout. Default: input name with the new
    /// extension, in the current directory.
    #[arg(short, long, env = "FILECONV_OUTPUT")]
    output: Option<PathBuf>,

    /// List every supported conversion and exit.
    #[arg(long)]
    list_formats: bool,

    /// Print a JSON summary instead of human-readable output.
    #[arg(long, env = "FILECONV_JSON")]
    json: bool,

    /// Recognize PDF pages with OCR when the PDF has no text layer.
    #[arg(long, env = "FILECONV_PDF_OCR")]
    pdf_ocr: bool,

    /// Base URL of the remote OCR service.
    #[arg(long, env = "FILECONV_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// API key for the remote OCR service.
    #[arg(long, env = "FILECONV_OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    /// OCR language code (tesseract style, e.g. eng, fra, deu).
    #[arg(long, env = "FILECONV_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// Skip contrast/threshold/sharpen before OCR.
    #[arg(long, env = "FILECONV_NO_PREPROCESS")]
    no_preprocess: bool,

    /// Keep digits inside words as recognized (no 0→O, 1→l, 5→S, 8→B).
    #[arg(long, env = "FILECONV_NO_OCR_FIXES")]
    no_ocr_fixes: bool,

    /// Retries for the remote OCR service.
    #[arg(long, env = "FILECONV_OCR_RETRIES", default_value_t = 2)]
    ocr_retries: u32,

    /// ffmpeg executable.
    #[arg(long, env = "FILECONV_FFMPEG_PATH")]
    ffmpeg_path: Option<PathBuf>,

    /// tesseract executable.
    #[arg(long, env = "FILECONV_TESSERACT_PATH")]
    tesseract_path: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FILECONV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FILECONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FILECONV_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "FILECONV_NO_PROGRESS")]
    no_progress: bool,
}

/// `--json` output.
#[derive(Serialize)]
struct Summary<'a> {
    input: &'a str,
    source: FileFormat,
    requested: FileFormat,
    #[serde(flatten)]
    output: &'a ConversionOutput,
    bytes: usize,
    path: Option<String>,
    duration_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise while the bar is up.
    let to_stdout = cli.output.as_deref() == Some(Path::new("-"));
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_formats;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_formats {
        return list_formats(cli.json);
    }

    let input = cli.input.clone().context("No input given")?;
    let target = cli.to.context("No target format given (--to)")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let converter = Converter::new(config).context("Failed to set up the converter")?;

    // ── Validate what we can before reading anything ─────────────────────
    let hinted = cli.from.or_else(|| {
        if is_url(&input) {
            detect_format(&extract_filename(&input, None))
        } else {
            detect_format(&input)
        }
    });
    if let Some(source) = hinted {
        converter
            .check_pair(source, target)
            .context("Conversion failed")?;
    }

    // ── Read input ───────────────────────────────────────────────────────
    let start = Instant::now();
    let file = resolve_input(&input, cli.download_timeout)
        .await
        .with_context(|| format!("Failed to read '{input}'"))?;
    let source = match hinted {
        Some(s) => s,
        None => detect_format(&file.name)
            .ok_or_else(|| ConvertError::UnknownFormat {
                file_name: file.name.clone(),
            })
            .context("Pass --from to name the source format")?,
    };
    // An explicit --from names extensionless input; a real extension is still checked.
    let file = match cli.from {
        Some(declared) => file.with_declared_format(declared),
        None => file,
    };

    // ── Convert ──────────────────────────────────────────────────────────
    let output = converter
        .convert_file(&file, source, target)
        .await
        .context("Conversion failed")?;
    let duration_ms = start.elapsed().as_millis() as u64;

    // ── Write ────────────────────────────────────────────────────────────
    let path = if to_stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&output.bytes)
            .context("Failed to write to stdout")?;
        handle.flush().ok();
        None
    } else {
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&output.file_name));
        write_atomic(&path, &output.bytes)
            .await
            .context("Failed to write output")?;
        Some(path)
    };

    // ── Summary ──────────────────────────────────────────────────────────
    if cli.json {
        let summary = Summary {
            input: &input,
            source,
            requested: target,
            output: &output,
            bytes: output.len(),
            path: path.as_ref().map(|p| p.display().to_string()),
            duration_ms,
        };
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        if to_stdout {
            eprintln!("{json}");
        } else {
            println!("{json}");
        }
    } else if !cli.quiet {
        if output.format != target {
            eprintln!(
                "{} no {} encoder available, wrote {} instead",
                cyan("⚠"),
                target,
                bold(&output.format.to_string())
            );
        }
        eprintln!(
            "{}  {} → {}  {}  {}ms{}",
            green("✔"),
            source,
            output.format,
            dim(&format!("{} bytes", output.len())),
            duration_ms,
            path.map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .ocr_language(cli.ocr_language.clone())
        .ocr_preprocess(!cli.no_preprocess)
        .ocr_fix_common_errors(!cli.no_ocr_fixes)
        .ocr_max_retries(cli.ocr_retries)
        .pdf_ocr_fallback(cli.pdf_ocr)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref endpoint) = cli.ocr_endpoint {
        builder = builder.ocr_endpoint(endpoint.clone());
    }
    if let Some(ref key) = cli.ocr_api_key {
        builder = builder.ocr_api_key(key.clone());
    }
    if let Some(ref path) = cli.ffmpeg_path {
        builder = builder.ffmpeg_path(path.clone());
    }
    if let Some(ref path) = cli.tesseract_path {
        builder = builder.tesseract_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Print the capability table, grouped by category.
fn list_formats(json: bool) -> Result<()> {
    if json {
        let table: serde_json::Map<String, serde_json::Value> = CAPABILITIES
            .iter()
            .map(|(from, targets)| {
                (
                    from.to_string(),
                    serde_json::Value::from(
                        targets.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
                    ),
                )
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&table).context("Failed to serialise formats")?
        );
        return Ok(());
    }

    for (category, title) in [
        (FormatCategory::Document, "Documents"),
        (FormatCategory::Image, "Images"),
        (FormatCategory::Audio, "Audio"),
        (FormatCategory::Video, "Video"),
    ] {
        println!("{}", bold(title));
        for (from, targets) in CAPABILITIES.iter().filter(|(f, _)| f.category() == category) {
            let list = targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {:<5} {} {}", from.to_string(), dim("→"), list);
        }
        println!();
    }
    println!(
        "{}",
        dim("Audio/video need ffmpeg, except mp3 ↔ wav. PDF input needs pdfium.")
    );
    Ok(())
}
