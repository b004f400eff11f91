//! Decoded audio passed by value from stage to stage.

use std::ops::Range;

/// Interleaved `f32` PCM at a fixed sample rate and channel count.
///
/// The layout (`sample_rate`, `channels`) is fixed when the decoder produces
/// the waveform. Stages that build new sample data go through
/// [`Waveform::with_samples`] so the layout is carried over unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Interleaved samples, nominally in [-1.0, 1.0]. Normalization may push
    /// peaks past full scale; encoders clamp.
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(sample_rate > 0, "sample rate must be positive");
        debug_assert!(channels > 0, "channel count must be positive");
        debug_assert_eq!(
            samples.len() % channels.max(1) as usize,
            0,
            "sample count must be a whole number of frames"
        );
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// A zero-length waveform with the same layout as `self`.
    pub fn empty_like(&self) -> Self {
        self.with_samples(Vec::new())
    }

    /// Build a new waveform with `samples` and this waveform's layout.
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self::new(samples, self.sample_rate, self.channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in whole milliseconds (truncated).
    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1_000 / self.sample_rate as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame count covering `ms` milliseconds at this sample rate.
    pub fn frames_for_ms(&self, ms: u64) -> usize {
        (ms * self.sample_rate as u64 / 1_000) as usize
    }

    /// Interleaved samples for the frame range `frames`.
    ///
    /// The range is clamped to the waveform length.
    pub fn frame_slice(&self, frames: Range<usize>) -> &[f32] {
        let ch = self.channels as usize;
        let end = frames.end.min(self.frames());
        let start = frames.start.min(end);
        &self.samples[start * ch..end * ch]
    }

    /// Copy the frame range `frames` into a new waveform with the same layout.
    pub fn slice_frames(&self, frames: Range<usize>) -> Self {
        self.with_samples(self.frame_slice(frames).to_vec())
    }

    /// Samples of channel `channel`, de-interleaved. Out-of-range channels
    /// give an empty vector.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        let ch = self.channels as usize;
        if channel >= ch {
            return Vec::new();
        }
        self.samples.iter().skip(channel).step_by(ch).copied().collect()
    }
}
