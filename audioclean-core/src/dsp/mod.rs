//! Signal-processing stages.
//!
//! Each stage takes a [`Waveform`](crate::audio::Waveform) by value and
//! returns a new one with the same sample rate and channel count. Degenerate
//! inputs (empty, all silence) are absorbed rather than reported as errors.

pub mod noise;
pub mod normalize;
pub mod segment;
pub mod silence;

pub use noise::{reduce_noise, NoiseProfile, NoiseSuppressor, SpectralGate};
pub use normalize::{normalize, NormalizeOutcome};
pub use segment::{segment, segment_count, Segment};
pub use silence::{detect_silence, trim, SilenceSpan, SilenceTrimmer, TrimOutcome};
