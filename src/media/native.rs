//! In-process audio codec: symphonia for decoding, hound for WAV output.

use crate::backend::{NativeAudioCodec, PcmAudio};
use crate::error::ConvertError;
use crate::format::FileFormat;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decodes anything symphonia knows; encodes WAV only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaCodec;

impl SymphoniaCodec {
    pub fn new() -> Self {
        Self
    }
}

fn decode_err(source: FileFormat, detail: impl std::fmt::Display) -> ConvertError {
    ConvertError::decode(source.to_string().to_uppercase(), detail)
}

impl NativeAudioCodec for SymphoniaCodec {
    fn decode(&self, bytes: &[u8], source: FileFormat) -> Result<PcmAudio, ConvertError> {
        let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let mut hint = Hint::new();
        hint.with_extension(source.extension());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| decode_err(source, e))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| decode_err(source, "no audio track"))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| decode_err(source, e))?;

        let mut samples: Vec<i16> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(decode_err(source, e)),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                    let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                // A corrupt frame is skipped, not fatal.
                Err(SymphoniaError::DecodeError(e)) => debug!("skipping bad frame: {}", e),
                Err(e) => return Err(decode_err(source, e)),
            }
        }

        if samples.is_empty() || channels == 0 || sample_rate == 0 {
            return Err(decode_err(source, "no audio frames"));
        }
        let audio = PcmAudio {
            samples,
            channels,
            sample_rate,
        };
        debug!(
            "Decoded {}: {} ch, {} Hz, {:.2}s",
            source,
            audio.channels,
            audio.sample_rate,
            audio.duration_secs()
        );
        Ok(audio)
    }

    fn supports_encoding(&self, target: FileFormat) -> bool {
        target == FileFormat::Wav
    }

    fn encode(&self, audio: &PcmAudio, target: FileFormat) -> Result<Vec<u8>, ConvertError> {
        if !self.supports_encoding(target) {
            return Err(ConvertError::encode(
                target.to_string().to_uppercase(),
                "no in-process encoder",
            ));
        }
        let spec = hound::WavSpec {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let wav_err = |e: hound::Error| ConvertError::encode("WAV", e);

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
            for sample in &audio.samples {
                writer.write_sample(*sample).map_err(wav_err)?;
            }
            writer.finalize().map_err(wav_err)?;
        }
        Ok(cursor.into_inner())
    }
}
