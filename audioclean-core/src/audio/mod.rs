//! Waveform representation and the codec adapter.
//!
//! ```text
//! compressed bytes ──AudioCodec::decode──▶ Waveform ──stages──▶ Waveform
//!                                                                  │
//! output bytes ◀──────────AudioCodec::encode───────────────────────┘
//! ```

pub mod codec;
pub mod ffmpeg;
pub mod format;
pub mod level;
pub mod waveform;

pub use codec::{AudioCodec, NativeCodec};
pub use ffmpeg::FfmpegCodec;
pub use format::AudioFormat;
pub use waveform::Waveform;
