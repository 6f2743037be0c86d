//! Media transform strategy: audio and video through the transcoder, with
//! an in-process fast path for simple audio pairs.
//!
//! mp3 ↔ wav is decoded in-process and, when the native codec can encode
//! the target, never touches ffmpeg. When it cannot, WAV is produced
//! instead and the output's format says so. If the fast path fails for any
//! reason the transcoder gets exactly one try. Transcoder failures are
//! terminal.

pub mod ffmpeg;
pub mod native;
pub mod transcoder;

pub use transcoder::TranscoderHandle;

use crate::backend::NativeAudioCodec;
use crate::error::ConvertError;
use crate::fallback::FallbackChain;
use crate::format::FileFormat;
use crate::progress::{report, ConversionStage, ProgressCallback};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Formats the in-process codec handles on both sides.
pub const NATIVE_AUDIO_FORMATS: &[FileFormat] = &[FileFormat::Mp3, FileFormat::Wav];

/// Whether `source → target` qualifies for the in-process fast path.
pub fn is_native_pair(source: FileFormat, target: FileFormat) -> bool {
    NATIVE_AUDIO_FORMATS.contains(&source) && NATIVE_AUDIO_FORMATS.contains(&target)
}

/// Bytes plus the format actually produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOutput {
    pub bytes: Vec<u8>,
    pub format: FileFormat,
}

pub struct MediaStrategy {
    transcoder: TranscoderHandle,
    codec: Arc<dyn NativeAudioCodec>,
    native_audio: bool,
    progress: Option<ProgressCallback>,
}

impl MediaStrategy {
    pub fn new(
        transcoder: TranscoderHandle,
        codec: Arc<dyn NativeAudioCodec>,
        native_audio: bool,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            transcoder,
            codec,
            native_audio,
            progress,
        }
    }

    pub fn transcoder(&self) -> &TranscoderHandle {
        &self.transcoder
    }

    fn stage(&self, stage: ConversionStage) {
        report(self.progress.as_ref(), stage);
    }

    /// Convert an audio or video file.
    pub async fn convert(
        &self,
        input: &[u8],
        input_name: &str,
        source: FileFormat,
        target: FileFormat,
    ) -> Result<MediaOutput, ConvertError> {
        if !(self.native_audio && is_native_pair(source, target)) {
            return self.transcode(input, input_name, target).await;
        }

        let outcome = FallbackChain::new()
            .attempt("native", || self.native(input, source, target))
            .attempt("transcoder", || self.transcode(input, input_name, target))
            .run()
            .await;

        match outcome {
            Ok(success) => {
                if success.fell_back() {
                    info!("Native audio path failed, transcoder produced {}", target);
                }
                Ok(success.value)
            }
            Err(exhausted) => Err(exhausted.into_last_error().unwrap_or_else(|| {
                ConvertError::Internal("media fallback chain was empty".to_string())
            })),
        }
    }

    /// Decode with the native codec, encode the target or WAV in its place.
    async fn native(
        &self,
        input: &[u8],
        source: FileFormat,
        target: FileFormat,
    ) -> Result<MediaOutput, ConvertError> {
        self.stage(ConversionStage::NativeAudio);
        let codec = Arc::clone(&self.codec);
        let bytes = input.to_vec();
        tokio::task::spawn_blocking(move || {
            let audio = codec.decode(&bytes, source)?;
            let format = if target == FileFormat::Wav || codec.supports_encoding(target) {
                target
            } else {
                warn!(
                    "No in-process {} encoder; writing WAV instead",
                    target.to_string().to_uppercase()
                );
                FileFormat::Wav
            };
            let bytes = codec.encode(&audio, format)?;
            debug!("Native audio: {} → {} ({} bytes)", source, format, bytes.len());
            Ok(MediaOutput { bytes, format })
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Audio task panicked: {}", e)))?
    }

    async fn transcode(
        &self,
        input: &[u8],
        input_name: &str,
        target: FileFormat,
    ) -> Result<MediaOutput, ConvertError> {
        if !self.transcoder.is_loaded() {
            self.stage(ConversionStage::LoadingTranscoder);
        }
        let transcoder = self.transcoder.get().await?;
        self.stage(ConversionStage::Transcoding);
        let bytes = transcoder.transcode(input, input_name, target).await?;
        Ok(MediaOutput {
            bytes,
            format: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PcmAudio, Transcoder, TranscoderLoader};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub;

    #[async_trait]
    impl Transcoder for Stub {
        async fn transcode(
            &self,
            _input: &[u8],
            _input_name: &str,
            target: FileFormat,
        ) -> Result<Vec<u8>, ConvertError> {
            Ok(format!("ffmpeg:{target}").into_bytes())
        }
    }

    #[derive(Default)]
    struct Loader {
        loads: AtomicUsize,
        missing: bool,
    }

    #[async_trait]
    impl TranscoderLoader for Loader {
        async fn load(&self) -> Result<Arc<dyn Transcoder>, ConvertError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.missing {
                Err(ConvertError::TranscoderUnavailable {
                    reason: "not installed".into(),
                })
            } else {
                Ok(Arc::new(Stub))
            }
        }
    }

    /// Decodes anything into one second of silence unless told to fail.
    struct FakeCodec {
        broken: bool,
        encodes_mp3: bool,
    }

    impl NativeAudioCodec for FakeCodec {
        fn decode(&self, _bytes: &[u8], source: FileFormat) -> Result<PcmAudio, ConvertError> {
            if self.broken {
                return Err(ConvertError::decode(source.to_string(), "bad header"));
            }
            Ok(PcmAudio {
                samples: vec![0; 16],
                channels: 1,
                sample_rate: 16,
            })
        }

        fn supports_encoding(&self, target: FileFormat) -> bool {
            target == FileFormat::Wav || (self.encodes_mp3 && target == FileFormat::Mp3)
        }

        fn encode(&self, _audio: &PcmAudio, target: FileFormat) -> Result<Vec<u8>, ConvertError> {
            Ok(format!("native:{target}").into_bytes())
        }
    }

    fn strategy(loader: Arc<Loader>, broken: bool, encodes_mp3: bool) -> MediaStrategy {
        MediaStrategy::new(
            TranscoderHandle::new(loader),
            Arc::new(FakeCodec {
                broken,
                encodes_mp3,
            }),
            true,
            None,
        )
    }

    #[tokio::test]
    async fn native_pair_skips_transcoder() {
        let loader = Arc::new(Loader::default());
        let s = strategy(loader.clone(), false, false);
        let out = s.convert(b"mp3", "a.mp3", FileFormat::Mp3, FileFormat::Wav).await.unwrap();
        assert_eq!(out.bytes, b"native:wav");
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unencodable_target_is_substituted_with_wav() {
        let s = strategy(Arc::new(Loader::default()), false, false);
        let out = s.convert(b"wav", "a.wav", FileFormat::Wav, FileFormat::Mp3).await.unwrap();
        assert_eq!(out.format, FileFormat::Wav);
        assert_eq!(out.bytes, b"native:wav");
    }

    #[tokio::test]
    async fn encodable_target_is_kept() {
        let s = strategy(Arc::new(Loader::default()), false, true);
        let out = s.convert(b"wav", "a.wav", FileFormat::Wav, FileFormat::Mp3).await.unwrap();
        assert_eq!(out.format, FileFormat::Mp3);
    }

    #[tokio::test]
    async fn native_failure_falls_back_to_transcoder_once() {
        let loader = Arc::new(Loader::default());
        let s = strategy(loader.clone(), true, false);
        let out = s.convert(b"x", "a.mp3", FileFormat::Mp3, FileFormat::Wav).await.unwrap();
        assert_eq!(out.bytes, b"ffmpeg:wav");
        assert_eq!(out.format, FileFormat::Wav);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transcoder_failure_after_native_failure_is_terminal() {
        let loader = Arc::new(Loader {
            missing: true,
            ..Loader::default()
        });
        let s = strategy(loader, true, false);
        let err = s
            .convert(b"x", "a.mp3", FileFormat::Mp3, FileFormat::Wav)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::TranscoderUnavailable { .. }));
    }

    #[tokio::test]
    async fn video_goes_to_transcoder_and_loads_it_once() {
        let loader = Arc::new(Loader::default());
        let s = strategy(loader.clone(), false, false);
        for _ in 0..3 {
            let out = s.convert(b"v", "clip.mp4", FileFormat::Mp4, FileFormat::Mp3).await.unwrap();
            assert_eq!(out.bytes, b"ffmpeg:mp3");
        }
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn native_pairs() {
        assert!(is_native_pair(FileFormat::Mp3, FileFormat::Wav));
        assert!(is_native_pair(FileFormat::Wav, FileFormat::Mp3));
        assert!(!is_native_pair(FileFormat::Ogg, FileFormat::Wav));
        assert!(!is_native_pair(FileFormat::Mp4, FileFormat::Mp3));
    }
}
