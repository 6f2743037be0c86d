//! End-to-end tests for edgequake-fileconv.
//!
//! Every engine that needs something outside the process (pdfium, ffmpeg,
//! tesseract, the remote OCR service) is replaced by a mock injected through
//! `ConversionConfig::builder()`. The remote OCR protocol runs against a
//! local axum server bound to an ephemeral port.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use edgequake_fileconv::{
    convert, convert_to_file, CapabilityTable, ConversionConfig, ConversionJob,
    ConversionProgressCallback, ConversionStage, ConvertError, Converter, FileFormat, InputFile,
    JobStatus, OcrResult, PdfEngine, RecognizeOptions, Recognizer, StaticCredentials, TextRun,
    Transcoder, TranscoderLoader, CAPABILITIES,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ── Mock engines ─────────────────────────────────────────────────────────────

/// PDF engine serving fixed page texts and counting every call.
struct MockPdf {
    pages: Vec<String>,
    calls: AtomicUsize,
}

impl MockPdf {
    fn new(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PdfEngine for MockPdf {
    fn page_count(&self, _pdf: &[u8]) -> Result<usize, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.len())
    }

    fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.clone())
    }

    fn extract_runs(&self, _pdf: &[u8]) -> Result<Vec<Vec<TextRun>>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .iter()
            .map(|text| {
                vec![TextRun {
                    text: text.clone(),
                    x: 72.0,
                    y: 720.0,
                    width: 200.0,
                }]
            })
            .collect())
    }

    fn render_pages(
        &self,
        _pdf: &[u8],
        max_pages: usize,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let side = (100.0 * scale) as u32;
        Ok(self
            .pages
            .iter()
            .take(max_pages)
            .map(|_| DynamicImage::ImageRgb8(RgbImage::from_pixel(side, side, Rgb([255, 255, 255]))))
            .collect())
    }
}

/// Recognizer that answers with fixed text, or fails, and counts calls.
struct MockRecognizer {
    name: &'static str,
    text: Option<&'static str>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    fn answering(name: &'static str, text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            text: Some(text),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            text: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    fn name(&self) -> &str {
        self.name
    }

    async fn recognize(
        &self,
        _png: &[u8],
        options: &RecognizeOptions,
    ) -> Result<OcrResult, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.text {
            Some(text) => Ok(OcrResult {
                text: text.to_string(),
                confidence: 0.9,
                language: Some(options.language.clone()),
                blocks: None,
                engine: self.name.to_string(),
            }),
            None => Err(ConvertError::RecognitionFailure {
                attempts: 1,
                detail: format!("{} is broken", self.name),
            }),
        }
    }
}

struct EchoTranscoder;

#[async_trait]
impl Transcoder for EchoTranscoder {
    async fn transcode(
        &self,
        input: &[u8],
        input_name: &str,
        target: FileFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        Ok(format!("{input_name}:{}→{target}", input.len()).into_bytes())
    }
}

/// Loader that takes a moment to load and counts how often it was asked.
#[derive(Default)]
struct CountingLoader {
    loads: AtomicUsize,
    missing: bool,
}

impl CountingLoader {
    fn missing() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            missing: true,
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscoderLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn Transcoder>, ConvertError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.missing {
            return Err(ConvertError::TranscoderUnavailable {
                reason: "ffmpeg not found on PATH".into(),
            });
        }
        Ok(Arc::new(EchoTranscoder))
    }
}

/// Records every stage it is told about.
#[derive(Default)]
struct StageLog {
    stages: Mutex<Vec<ConversionStage>>,
    errors: Mutex<Vec<String>>,
}

impl StageLog {
    fn stages(&self) -> Vec<ConversionStage> {
        self.stages.lock().unwrap().clone()
    }
}

impl ConversionProgressCallback for StageLog {
    fn on_stage(&self, stage: &ConversionStage) {
        self.stages.lock().unwrap().push(stage.clone());
    }

    fn on_conversion_error(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Half a second of a 440 Hz tone, mono 16-bit.
fn wav_tone() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..4_000 {
            let t = i as f32 / 8_000.0;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn media_box(pdf: &[u8]) -> Vec<i64> {
    let doc = lopdf::Document::load_mem(pdf).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1, "expected a one-page PDF");
    let page_id = *pages.values().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    page.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect()
}

/// Filter name and raw stream bytes of the page's `/Im0` image.
fn embedded_image(pdf: &[u8]) -> (Vec<u8>, lopdf::Stream) {
    let doc = lopdf::Document::load_mem(pdf).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let image_id = doc
        .get_dictionary(page_id)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"XObject")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Im0")
        .unwrap()
        .as_reference()
        .unwrap();
    let stream = doc.get_object(image_id).unwrap().as_stream().unwrap().clone();
    let filter = stream.dict.get(b"Filter").unwrap().as_name().unwrap().to_vec();
    (filter, stream)
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn multi_page_pdf_to_text_joins_pages() {
    let engine = MockPdf::new(&["Page one\n", "Page two", "Page three\n\n"]);
    let config = ConversionConfig::builder()
        .pdf_engine(engine.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("report.pdf", b"%PDF-1.7 stub".to_vec());
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Pdf, FileFormat::Txt)
            .await
    );

    assert_eq!(output.format, FileFormat::Txt);
    assert_eq!(output.file_name, "report.txt");
    assert_eq!(output.mime_type, "text/plain");
    assert_eq!(output.text().unwrap(), "Page one\n\nPage two\n\nPage three");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn scanned_jpeg_to_pdf_keeps_pixel_size() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.jpg");
    std::fs::write(&input, jpeg(800, 600)).unwrap();
    let out_path = dir.path().join("out/scan.pdf");

    let output = assert_ok!(
        convert_to_file(
            input.to_str().unwrap(),
            FileFormat::Jpg,
            FileFormat::Pdf,
            &out_path,
            &ConversionConfig::default(),
        )
        .await
    );

    assert_eq!(output.file_name, "scan.pdf");
    let written = std::fs::read(&out_path).unwrap();
    assert!(written.starts_with(b"%PDF-"));
    assert_eq!(media_box(&written), vec![0, 0, 800, 600]);
    assert!(!dir.path().join("out/scan.pdf.tmp").exists());
}

#[tokio::test]
async fn mismatched_extension_is_refused_before_any_engine_runs() {
    let engine = MockPdf::new(&["never read"]);
    let ocr = MockRecognizer::answering("local", "never read");
    let config = ConversionConfig::builder()
        .pdf_engine(engine.clone())
        .fallback_recognizer(ocr.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("photo.png", png(10, 10));
    let err = assert_err!(
        converter
            .convert_file(&file, FileFormat::Jpg, FileFormat::Txt)
            .await
    );

    match err.kind() {
        ConvertError::FormatMismatch {
            file_name,
            declared,
            actual,
        } => {
            assert_eq!(file_name, "photo.png");
            assert_eq!(*declared, FileFormat::Jpg);
            assert_eq!(actual, "png");
        }
        other => panic!("expected FormatMismatch, got {other:?}"),
    }
    assert_eq!(err.source_format, FileFormat::Jpg);
    assert_eq!(err.target_format, FileFormat::Txt);
    assert_eq!(engine.calls(), 0);
    assert_eq!(ocr.calls(), 0);
}

#[tokio::test]
async fn image_stream_filter_matches_the_embedded_bytes() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();

    let real = assert_ok!(
        converter
            .convert_file(&InputFile::new("scan.jpg", jpeg(24, 16)), FileFormat::Jpg, FileFormat::Pdf)
            .await
    );
    let (filter, stream) = embedded_image(&real.bytes);
    assert_eq!(filter, b"DCTDecode");
    assert!(stream.content.starts_with(&[0xFF, 0xD8, 0xFF]));

    // PNG bytes behind a .jpg name decode fine but must not be labelled JPEG.
    let disguised = assert_ok!(
        converter
            .convert_file(&InputFile::new("scan.jpg", png(24, 16)), FileFormat::Jpg, FileFormat::Pdf)
            .await
    );
    let (filter, stream) = embedded_image(&disguised.bytes);
    assert_eq!(filter, b"FlateDecode");
    assert!(!stream.content.starts_with(b"\x89PNG"));
    let pixels = stream.decompressed_content().unwrap();
    assert_eq!(pixels.len(), 24 * 16 * 3);
    assert_eq!(&pixels[..3], &[250, 250, 250]);
    assert_eq!(media_box(&disguised.bytes), vec![0, 0, 24, 16]);
}

#[tokio::test]
async fn declared_format_names_extensionless_downloads() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();

    let bare = InputFile::new("download", b"hello\nworld".to_vec());
    let err = assert_err!(
        converter
            .convert_file(&bare, FileFormat::Txt, FileFormat::Docx)
            .await
    );
    assert!(matches!(err.kind(), ConvertError::FormatMismatch { .. }));

    let named = bare.with_declared_format(FileFormat::Txt);
    let output = assert_ok!(
        converter
            .convert_file(&named, FileFormat::Txt, FileFormat::Docx)
            .await
    );
    assert_eq!(output.file_name, "download.docx");
    assert!(output.bytes.starts_with(b"PK"));

    // A recognized but different extension is still a mismatch.
    let wrong = InputFile::new("photo.png", png(4, 4)).with_declared_format(FileFormat::Jpg);
    let err = assert_err!(
        converter
            .convert_file(&wrong, FileFormat::Jpg, FileFormat::Pdf)
            .await
    );
    assert!(matches!(err.kind(), ConvertError::FormatMismatch { .. }));
}

#[tokio::test]
async fn video_without_transcoder_explains_the_fix() {
    let loader = CountingLoader::missing();
    let log = Arc::new(StageLog::default());
    let config = ConversionConfig::builder()
        .transcoder_loader(loader.clone())
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("clip.mp4", b"\0\0\0\x18ftypmp42".to_vec());
    let err = assert_err!(
        converter
            .convert_file(&file, FileFormat::Mp4, FileFormat::Mp3)
            .await
    );

    assert!(matches!(
        err.kind(),
        ConvertError::TranscoderUnavailable { .. }
    ));
    let msg = err.to_string();
    assert!(msg.contains("mp4 → mp3"), "got: {msg}");
    assert!(msg.contains("Install ffmpeg"), "got: {msg}");
    assert!(msg.contains("FILECONV_FFMPEG_PATH"), "got: {msg}");

    let stages = log.stages();
    assert!(stages.contains(&ConversionStage::LoadingTranscoder));
    assert_eq!(stages.last(), Some(&ConversionStage::Failed));
    assert_eq!(log.errors.lock().unwrap().len(), 1);

    // A failed load is retried on the next request.
    assert_err!(
        converter
            .convert_file(&file, FileFormat::Mp4, FileFormat::Mp3)
            .await
    );
    assert_eq!(loader.loads(), 2);
    assert!(!converter.transcoder().is_loaded());
}

#[tokio::test]
async fn concurrent_media_conversions_load_the_transcoder_once() {
    let loader = Arc::new(CountingLoader::default());
    let config = ConversionConfig::builder()
        .transcoder_loader(loader.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let files: Vec<InputFile> = (0..6)
        .map(|i| InputFile::new(format!("clip{i}.mkv"), vec![0u8; 16]))
        .collect();
    let results = futures::future::join_all(
        files
            .iter()
            .map(|f| converter.convert_file(f, FileFormat::Mkv, FileFormat::Webm)),
    )
    .await;

    for (i, result) in results.into_iter().enumerate() {
        let output = assert_ok!(result);
        assert_eq!(output.format, FileFormat::Webm);
        assert_eq!(output.file_name, format!("clip{i}.webm"));
        assert_eq!(output.text().unwrap(), format!("clip{i}.mkv:16→webm"));
    }
    assert_eq!(loader.loads(), 1);
    assert!(converter.transcoder().is_loaded());
}

#[tokio::test]
async fn wav_to_mp3_without_native_encoder_writes_wav() {
    let loader = Arc::new(CountingLoader::default());
    let config = ConversionConfig::builder()
        .transcoder_loader(loader.clone())
        .build()
        .unwrap();

    let output = assert_ok!(
        edgequake_fileconv::convert_bytes(
            wav_tone(),
            "tone.wav",
            FileFormat::Wav,
            FileFormat::Mp3,
            &config,
        )
        .await
    );

    assert_eq!(output.format, FileFormat::Wav);
    assert_eq!(output.file_name, "tone.wav");
    assert_eq!(output.mime_type, "audio/wav");
    assert!(output.bytes.starts_with(b"RIFF"));

    let reader = hound::WavReader::new(Cursor::new(output.bytes)).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 8_000);
    assert_eq!(reader.len(), 4_000);
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn undecodable_mp3_falls_back_to_the_transcoder() {
    let loader = Arc::new(CountingLoader::default());
    let config = ConversionConfig::builder()
        .transcoder_loader(loader.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("voice.mp3", b"definitely not an mp3 stream".to_vec());
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Mp3, FileFormat::Wav)
            .await
    );

    assert_eq!(output.format, FileFormat::Wav);
    assert_eq!(output.text().unwrap(), "voice.mp3:28→wav");
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn unsupported_pair_is_refused_before_reading_input() {
    let err = assert_err!(
        convert(
            "/definitely/not/here.txt",
            FileFormat::Txt,
            FileFormat::Mp3,
            &ConversionConfig::default(),
        )
        .await
    );
    assert!(matches!(
        err.kind(),
        ConvertError::UnsupportedConversion { .. }
    ));
    assert!(err.to_string().contains("--list-formats"));
}

#[tokio::test]
async fn advertised_but_unrouted_pair_is_not_implemented() {
    static CUSTOM: &[(FileFormat, &[FileFormat])] = &[
        (FileFormat::Txt, &[FileFormat::Pdf, FileFormat::Png]),
    ];
    let converter =
        Converter::with_capabilities(ConversionConfig::default(), CapabilityTable::new(CUSTOM))
            .unwrap();
    assert_eq!(
        converter.routes().unrouted(),
        &[(FileFormat::Txt, FileFormat::Png)]
    );

    let file = InputFile::new("notes.txt", b"hello".to_vec());
    let err = assert_err!(
        converter
            .convert_file(&file, FileFormat::Txt, FileFormat::Png)
            .await
    );
    assert!(matches!(err.kind(), ConvertError::NotImplemented { .. }));

    assert_ok!(
        converter
            .convert_file(&file, FileFormat::Txt, FileFormat::Pdf)
            .await
    );
}

#[test]
fn every_advertised_pair_has_a_route() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    assert!(converter.routes().unrouted().is_empty());
    let pairs: usize = CAPABILITIES.iter().map(|(_, targets)| targets.len()).sum();
    assert_eq!(converter.routes().len(), pairs);
}

#[tokio::test]
async fn text_round_trips_through_docx() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    let text = "Quarterly notes\n\nRevenue grew & costs <fell>.";

    let docx = assert_ok!(
        converter
            .convert_file(
                &InputFile::new("notes.txt", text.as_bytes().to_vec()),
                FileFormat::Txt,
                FileFormat::Docx,
            )
            .await
    );
    assert_eq!(docx.file_name, "notes.docx");
    assert!(docx.bytes.starts_with(b"PK"));

    let back = assert_ok!(
        converter
            .convert_file(
                &InputFile::new(docx.file_name.clone(), docx.bytes),
                FileFormat::Docx,
                FileFormat::Txt,
            )
            .await
    );
    let recovered = back.text().unwrap();
    assert!(recovered.contains("Quarterly notes"), "got: {recovered}");
    assert!(recovered.contains("Revenue grew & costs <fell>."), "got: {recovered}");
}

#[tokio::test]
async fn image_only_pdf_is_recognized_when_asked() {
    let engine = MockPdf::new(&["", "  "]);
    let ocr = MockRecognizer::answering("local", "5canned  text");
    let config = ConversionConfig::builder()
        .pdf_engine(engine.clone())
        .fallback_recognizer(ocr.clone())
        .pdf_ocr_fallback(true)
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("scan.pdf", b"%PDF-1.4 stub".to_vec());
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Pdf, FileFormat::Txt)
            .await
    );
    // One recognition per page; digit fix and whitespace collapse applied.
    assert_eq!(ocr.calls(), 2);
    assert_eq!(output.text().unwrap(), "Scanned text\n\nScanned text");
}

#[tokio::test]
async fn conversion_job_tracks_the_lifecycle() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    let mut job = ConversionJob::new(
        InputFile::new("scan.jpg", jpeg(40, 30)),
        FileFormat::Jpg,
        FileFormat::Png,
    );
    assert_eq!(job.status(), JobStatus::Pending);
    assert_eq!(job.run(&converter).await, JobStatus::Completed);
    let output = job.output().unwrap();
    assert_eq!(output.file_name, "scan.png");
    let decoded = image::load_from_memory(&output.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 30));
}

// ── Remote OCR against a local HTTP server ───────────────────────────────────

#[derive(Clone, Default)]
struct OcrServer {
    uploads: Arc<AtomicUsize>,
    parses: Arc<AtomicUsize>,
    fail_uploads: bool,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer test-key")
}

async fn upload(
    State(server): State<OcrServer>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    server.uploads.fetch_add(1, Ordering::SeqCst);
    if server.fail_uploads {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "overloaded" })),
        );
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.unwrap_or_default();
            if bytes.starts_with(b"\x89PNG") {
                return (StatusCode::OK, Json(json!({ "file_id": "file-42" })));
            }
        }
    }
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "no png" })))
}

async fn parse(
    State(server): State<OcrServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    server.parses.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) || body["file_id"] != "file-42" {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown file" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "text": "Inv0ice  #1234\r\n\r\n\r\n\r\nTotal due",
            "confidence": 0.97,
            "language": body["language"],
        })),
    )
}

async fn spawn_ocr_server(server: OcrServer) -> String {
    let app = Router::new()
        .route("/upload", post(upload))
        .route("/parse", post(parse))
        .with_state(server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn remote_ocr_reads_an_image() {
    let server = OcrServer::default();
    let endpoint = spawn_ocr_server(server.clone()).await;
    let local = MockRecognizer::answering("local", "should not run");
    let log = Arc::new(StageLog::default());
    let config = ConversionConfig::builder()
        .ocr_endpoint(endpoint)
        .credentials(Arc::new(StaticCredentials(Some("test-key".into()))))
        .fallback_recognizer(local.clone())
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("invoice.png", png(64, 32));
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Png, FileFormat::Txt)
            .await
    );

    // Digits inside words are fixed, standalone numbers are not.
    assert_eq!(output.text().unwrap(), "InvOice #1234\n\nTotal due");
    assert_eq!(output.file_name, "invoice.txt");
    assert_eq!(server.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(server.parses.load(Ordering::SeqCst), 1);
    assert_eq!(local.calls(), 0);

    let stages = log.stages();
    assert!(stages.contains(&ConversionStage::Preprocessing));
    assert!(stages.contains(&ConversionStage::PrimaryRecognition { attempt: 1 }));
    assert!(!stages.contains(&ConversionStage::FallbackRecognition));
}

#[tokio::test]
async fn remote_ocr_retries_then_falls_back() {
    let server = OcrServer {
        fail_uploads: true,
        ..OcrServer::default()
    };
    let endpoint = spawn_ocr_server(server.clone()).await;
    let local = MockRecognizer::answering("local", "read locally");
    let config = ConversionConfig::builder()
        .ocr_endpoint(endpoint)
        .ocr_api_key("test-key")
        .ocr_max_retries(2)
        .ocr_retry_delay_ms(1)
        .fallback_recognizer(local.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("note.png", png(16, 16));
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Png, FileFormat::Txt)
            .await
    );

    assert_eq!(output.text().unwrap(), "read locally");
    assert_eq!(server.uploads.load(Ordering::SeqCst), 3);
    assert_eq!(server.parses.load(Ordering::SeqCst), 0);
    assert_eq!(local.calls(), 1);
}

#[tokio::test]
async fn without_credentials_only_the_local_recognizer_runs() {
    let server = OcrServer::default();
    let endpoint = spawn_ocr_server(server.clone()).await;
    let local = MockRecognizer::answering("local", "offline text");
    let config = ConversionConfig::builder()
        .ocr_endpoint(endpoint)
        .credentials(Arc::new(StaticCredentials(None)))
        .fallback_recognizer(local.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("page.png", png(16, 16));
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Png, FileFormat::Txt)
            .await
    );

    assert_eq!(output.text().unwrap(), "offline text");
    assert_eq!(server.uploads.load(Ordering::SeqCst), 0);
    assert_eq!(local.calls(), 1);
}

#[tokio::test]
async fn both_recognizers_failing_is_terminal() {
    let remote = MockRecognizer::failing("remote");
    let local = MockRecognizer::failing("local");
    let config = ConversionConfig::builder()
        .primary_recognizer(remote.clone())
        .fallback_recognizer(local.clone())
        .ocr_max_retries(1)
        .ocr_retry_delay_ms(1)
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let file = InputFile::new("blank.png", png(16, 16));
    let err = assert_err!(
        converter
            .convert_file(&file, FileFormat::Png, FileFormat::Txt)
            .await
    );

    match err.kind() {
        ConvertError::FallbackExhausted { primary, fallback } => {
            assert!(primary.as_deref().unwrap_or("").contains("remote is broken"));
            assert!(fallback.contains("local is broken"));
        }
        other => panic!("expected FallbackExhausted, got {other:?}"),
    }
    assert_eq!(remote.calls(), 2);
    assert_eq!(local.calls(), 1);
}

// ── Real engines (skipped when not installed) ────────────────────────────────

#[tokio::test]
async fn real_ffmpeg_transcodes_wav_to_flac() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    if let Err(e) = converter.transcoder().get().await {
        println!("SKIP — {}", e.to_string().lines().next().unwrap_or_default());
        return;
    }

    let file = InputFile::new("tone.wav", wav_tone());
    let output = assert_ok!(
        converter
            .convert_file(&file, FileFormat::Wav, FileFormat::Flac)
            .await
    );
    assert_eq!(output.format, FileFormat::Flac);
    assert!(output.bytes.starts_with(b"fLaC"));
}

#[tokio::test]
async fn real_pdfium_reads_back_generated_text() {
    let converter = Converter::new(ConversionConfig::default()).unwrap();
    let text = "First paragraph of the memo.\n\nSecond paragraph.";
    let pdf = assert_ok!(
        converter
            .convert_file(
                &InputFile::new("memo.txt", text.as_bytes().to_vec()),
                FileFormat::Txt,
                FileFormat::Pdf,
            )
            .await
    );

    let result = converter
        .convert_file(
            &InputFile::new("memo.pdf", pdf.bytes),
            FileFormat::Pdf,
            FileFormat::Txt,
        )
        .await;
    let output = match result {
        Err(e) if matches!(e.kind(), ConvertError::PdfEngineUnavailable(_)) => {
            println!("SKIP — pdfium library not found");
            return;
        }
        other => assert_ok!(other),
    };
    let recovered = output.text().unwrap();
    assert!(recovered.contains("First paragraph of the memo."), "got: {recovered}");
    assert!(recovered.contains("Second paragraph."), "got: {recovered}");
}
