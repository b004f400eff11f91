//! Codec adapter: compressed bytes ⇄ [`Waveform`].
//!
//! The pipeline never touches a container format directly. It goes through
//! [`AudioCodec`], so the codec backend can be swapped (see
//! [`FfmpegCodec`](super::ffmpeg::FfmpegCodec)) without touching any stage.

use std::io::{Cursor, ErrorKind};

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::{AudioFormat, Waveform};
use crate::error::{AudioCleanError, Result};
use crate::scratch::ScratchSpace;

/// Contract for codec backends.
///
/// Implementations take `&self` so one instance can serve every worker of a
/// batch concurrently.
pub trait AudioCodec: Send + Sync {
    /// Decode a whole compressed file.
    ///
    /// # Errors
    /// - `UnsupportedFormat` when the container/codec is not recognised.
    /// - `CorruptInput` when parsing fails part-way through.
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<Waveform>;

    /// Encode a waveform into `format`.
    ///
    /// Backends that need file-based IO must keep their files inside
    /// `scratch` and release them before returning.
    ///
    /// # Errors
    /// `UnsupportedFormat` when this backend cannot produce `format`.
    fn encode(
        &self,
        waveform: &Waveform,
        format: AudioFormat,
        scratch: &ScratchSpace,
    ) -> Result<Vec<u8>>;
}

/// In-process codec: symphonia for decoding, hound for WAV output.
///
/// Encodes WAV only; MP3/FLAC targets need an external encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCodec for NativeCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<Waveform> {
        decode_with_symphonia(bytes, format)
    }

    fn encode(
        &self,
        waveform: &Waveform,
        format: AudioFormat,
        _scratch: &ScratchSpace,
    ) -> Result<Vec<u8>> {
        match format {
            AudioFormat::Wav => encode_wav(waveform),
            other => Err(AudioCleanError::UnsupportedFormat(format!(
                "native codec cannot encode {other}"
            ))),
        }
    }
}

fn decode_with_symphonia(bytes: &[u8], format: AudioFormat) -> Result<Waveform> {
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => {
                AudioCleanError::UnsupportedFormat(format!("{format}: {what}"))
            }
            other => AudioCleanError::CorruptInput(format!("probe failed: {other}")),
        })?;

    let mut reader = probed.format;
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioCleanError::CorruptInput("no audio track found".into()))?;
    let track_id = track.id;
    let declared_rate = track.codec_params.sample_rate;
    let declared_channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioCleanError::UnsupportedFormat(format!("{format}: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut layout: Option<(u32, u16)> = None;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => {
                return Err(AudioCleanError::CorruptInput(format!(
                    "read failed after {} samples: {e}",
                    samples.len()
                )))
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("skipping undecodable packet: {e}");
                skipped_packets += 1;
                continue;
            }
            Err(e) => {
                return Err(AudioCleanError::CorruptInput(format!(
                    "decode failed after {} samples: {e}",
                    samples.len()
                )))
            }
        };
        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        let packet_layout = (spec.rate, spec.channels.count() as u16);
        match layout {
            None => layout = Some(packet_layout),
            Some(l) if l != packet_layout => {
                return Err(AudioCleanError::CorruptInput(format!(
                    "stream layout changed mid-file: {l:?} -> {packet_layout:?}"
                )))
            }
            Some(_) => {}
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let (sample_rate, channels) = match (layout, declared_rate, declared_channels) {
        (Some(l), _, _) => l,
        (None, Some(rate), Some(ch)) => (rate, ch),
        _ => {
            return Err(AudioCleanError::CorruptInput(
                "stream contains no decodable audio".into(),
            ))
        }
    };
    if sample_rate == 0 || channels == 0 {
        return Err(AudioCleanError::CorruptInput(format!(
            "invalid stream layout: {sample_rate} Hz, {channels} channels"
        )));
    }

    debug!(
        format = %format,
        sample_rate,
        channels,
        samples = samples.len(),
        skipped_packets,
        "decoded input"
    );

    Ok(Waveform::new(samples, sample_rate, channels))
}

/// 16-bit PCM WAV, samples clamped to full scale.
pub(crate) fn encode_wav(waveform: &Waveform) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: waveform.channels(),
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioCleanError::Encode(format!("wav header: {e}")))?;
        for &sample in waveform.samples() {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer
                .write_sample(value)
                .map_err(|e| AudioCleanError::Encode(format!("wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioCleanError::Encode(format!("wav finalize: {e}")))?;
    }
    Ok(cursor.into_inner())
}
