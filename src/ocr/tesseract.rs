//! Local recognizer: the `tesseract` command-line tool.
//!
//! The PNG is written to a temp file and `tesseract <png> stdout -l <lang> tsv`
//! is run. TSV output carries one row per word with a 0–100 confidence;
//! words are regrouped into lines and the overall confidence is the mean
//! word confidence scaled to `0.0–1.0`.

use super::{BoundingBox, OcrResult, TextBlock};
use crate::backend::{RecognizeOptions, Recognizer};
use crate::error::ConvertError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// Name reported in [`OcrResult::engine`].
pub const TESSERACT_ENGINE: &str = "tesseract";

/// `tesseract` subprocess recognizer.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: path.into(),
        }
    }

    fn failure(detail: impl std::fmt::Display) -> ConvertError {
        ConvertError::RecognitionFailure {
            attempts: 1,
            detail: format!("tesseract: {detail}"),
        }
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        TESSERACT_ENGINE
    }

    async fn recognize(
        &self,
        png: &[u8],
        options: &RecognizeOptions,
    ) -> Result<OcrResult, ConvertError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("page.png");
        tokio::fs::write(&input, png).await?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(&options.language);
        if options.preserve_layout {
            cmd.arg("-c").arg("preserve_interword_spaces=1");
        }
        cmd.arg("tsv");

        debug!("Running {} on {} bytes", self.binary.display(), png.len());
        let output = cmd.output().await.map_err(|e| {
            Self::failure(format!("could not run {}: {e}", self.binary.display()))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::failure(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let words = parse_tsv(&tsv);
        let result = assemble(&words, &options.language);
        info!(
            "tesseract: {} words, confidence {:.2}",
            words.len(),
            result.confidence
        );
        Ok(result)
    }
}

/// One recognized word from TSV output.
#[derive(Debug, Clone, PartialEq)]
pub struct TsvWord {
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
    pub text: String,
    /// 0.0–1.0; words tesseract could not score count as 0.
    pub confidence: f32,
    pub bbox: Option<BoundingBox>,
}

/// Parse tesseract TSV. Level-5 rows are words; everything else is skipped.
///
/// Columns: `level page block par line word left top width height conf text`.
pub fn parse_tsv(tsv: &str) -> Vec<TsvWord> {
    let mut words = Vec::new();
    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        let Ok(conf) = fields[10].trim().parse::<f32>() else {
            continue;
        };
        let num = |i: usize| fields[i].parse::<u32>().unwrap_or(0);
        let bbox = (|| {
            Some(BoundingBox {
                x: fields[6].parse().ok()?,
                y: fields[7].parse().ok()?,
                width: fields[8].parse().ok()?,
                height: fields[9].parse().ok()?,
            })
        })();
        words.push(TsvWord {
            block: num(2),
            paragraph: num(3),
            line: num(4),
            text: text.to_string(),
            confidence: if conf < 0.0 { 0.0 } else { conf / 100.0 },
            bbox,
        });
    }
    words
}

/// Regroup words into lines (blank line between paragraphs) and score them.
fn assemble(words: &[TsvWord], language: &str) -> OcrResult {
    let mut text = String::new();
    let mut blocks = Vec::new();
    let mut prev: Option<(u32, u32, u32)> = None;

    for word in words {
        let key = (word.block, word.paragraph, word.line);
        match prev {
            None => {}
            Some(p) if p == key => text.push(' '),
            Some((b, para, _)) if (b, para) == (key.0, key.1) => text.push('\n'),
            Some(_) => text.push_str("\n\n"),
        }
        text.push_str(&word.text);
        prev = Some(key);

        if let Some(bbox) = word.bbox {
            blocks.push(TextBlock {
                text: word.text.clone(),
                bbox,
                confidence: word.confidence,
            });
        }
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
    };

    OcrResult {
        text,
        confidence,
        language: Some(language.to_string()),
        blocks: if blocks.is_empty() { None } else { Some(blocks) },
        engine: TESSERACT_ENGINE.to_string(),
    }
}
