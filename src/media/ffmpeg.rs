//! ffmpeg-backed [`Transcoder`].
//!
//! Every transcode is file-to-file inside a private temp directory:
//! `input.<ext>` (extension taken from the original name so ffmpeg picks the
//! right demuxer) → `output.<target>`. Both files are removed before the
//! bytes are handed back.

use crate::backend::{Transcoder, TranscoderLoader};
use crate::error::ConvertError;
use crate::format::FileFormat;
use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming the ffmpeg executable.
pub const FFMPEG_PATH_ENV: &str = "FILECONV_FFMPEG_PATH";

/// Extension assumed when the original name carries none.
const DEFAULT_INPUT_EXT: &str = "mp4";

/// Encoder arguments for each target container.
pub fn ffmpeg_args(target: FileFormat) -> Result<&'static [&'static str], ConvertError> {
    use FileFormat::*;
    let args: &'static [&'static str] = match target {
        Mp4 | Mov => &[
            "-c:v", "libx264", "-preset", "fast", "-crf", "23",
            "-c:a", "aac", "-b:a", "128k",
            "-movflags", "+faststart",
        ],
        Mkv => &[
            "-c:v", "libx264", "-preset", "fast", "-crf", "23",
            "-c:a", "aac", "-b:a", "128k",
        ],
        Webm => &[
            "-c:v", "libvpx-vp9", "-crf", "30", "-b:v", "0",
            "-c:a", "libopus",
        ],
        Avi => &["-c:v", "mjpeg", "-q:v", "3", "-c:a", "libmp3lame"],
        Flv => &["-c:v", "flv", "-c:a", "libmp3lame", "-ar", "44100"],
        Wav => &["-vn", "-c:a", "pcm_s16le"],
        Mp3 => &["-vn", "-c:a", "libmp3lame", "-b:a", "192k"],
        Ogg => &["-vn", "-c:a", "libvorbis", "-q:a", "5"],
        Aac | M4a => &["-vn", "-c:a", "aac", "-b:a", "192k"],
        Flac => &["-vn", "-c:a", "flac"],
        other => {
            return Err(ConvertError::TranscodeFailed {
                target: other,
                detail: "not an audio or video container".to_string(),
            })
        }
    };
    Ok(args)
}

/// Input extension for the temp file, lowercased.
fn input_extension(input_name: &str) -> String {
    Path::new(input_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_INPUT_EXT.to_string())
}

/// Finds and probes the ffmpeg executable.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLoader {
    path: Option<PathBuf>,
}

impl FfmpegLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Explicit path, then `FILECONV_FFMPEG_PATH`, then `ffmpeg` on `PATH`.
    fn resolve(&self) -> PathBuf {
        self.path
            .clone()
            .or_else(|| std::env::var_os(FFMPEG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }
}

#[async_trait]
impl TranscoderLoader for FfmpegLoader {
    async fn load(&self) -> Result<Arc<dyn Transcoder>, ConvertError> {
        let binary = self.resolve();
        let probe = binary.clone();
        let version = tokio::task::spawn_blocking(move || {
            ffmpeg_sidecar::version::ffmpeg_version_with_path(&probe)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("ffmpeg probe panicked: {}", e)))?
        .map_err(|e| ConvertError::TranscoderUnavailable {
            reason: format!("could not run '{}': {}", binary.display(), e),
        })?;
        info!("Loaded ffmpeg {} from {}", version, binary.display());
        Ok(Arc::new(FfmpegTranscoder { binary }))
    }
}

/// A probed ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    /// Run ffmpeg once, collecting error-level log lines. Blocking.
    fn run(
        binary: &Path,
        input: &Path,
        output: &Path,
        args: &[&str],
        target: FileFormat,
    ) -> Result<(), ConvertError> {
        let fail = |detail: String| ConvertError::TranscodeFailed { target, detail };

        let mut child = FfmpegCommand::new_with_path(binary)
            .hide_banner()
            .overwrite()
            .input(input.to_string_lossy().as_ref() as &str)
            .args(args)
            .output(output.to_string_lossy().as_ref() as &str)
            .spawn()
            .map_err(|e| fail(format!("spawn: {e}")))?;

        let mut errors = Vec::new();
        for event in child.iter().map_err(|e| fail(e.to_string()))? {
            match event {
                FfmpegEvent::Error(msg) => errors.push(msg),
                FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => errors.push(msg),
                FfmpegEvent::Log(level, msg) => debug!("[ffmpeg {:?}] {}", level, msg),
                _ => {}
            }
        }
        let status = child.wait().map_err(|e| fail(e.to_string()))?;
        if !status.success() {
            let detail = if errors.is_empty() {
                format!("ffmpeg exited with {status}")
            } else {
                errors.join("; ")
            };
            return Err(fail(detail));
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &[u8],
        input_name: &str,
        target: FileFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        let args = ffmpeg_args(target)?;
        let dir = tempfile::tempdir()?;
        let input_path = dir.path().join(format!("input.{}", input_extension(input_name)));
        let output_path = dir.path().join(format!("output.{}", target.extension()));
        tokio::fs::write(&input_path, input).await?;

        debug!(
            "ffmpeg: {} ({} bytes) → {}",
            input_path.display(),
            input.len(),
            output_path.display()
        );
        let binary = self.binary.clone();
        let (inp, out) = (input_path.clone(), output_path.clone());
        let result = tokio::task::spawn_blocking(move || {
            Self::run(&binary, &inp, &out, args, target)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("ffmpeg task panicked: {}", e)));

        let bytes = match result.and_then(|r| r) {
            Ok(()) => tokio::fs::read(&output_path).await.map_err(ConvertError::from),
            Err(e) => Err(e),
        };
        let _ = tokio::fs::remove_file(&input_path).await;
        let _ = tokio::fs::remove_file(&output_path).await;
        bytes
    }
}
