//! Batch configuration.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::error::{AudioCleanError, Result};

pub const MIN_SILENCE_MS_RANGE: RangeInclusive<u64> = 300..=3_000;
pub const SILENCE_THRESHOLD_DB_RANGE: RangeInclusive<f32> = -70.0..=-10.0;
pub const NOISE_SAMPLE_SECS_RANGE: RangeInclusive<f32> = 1.0..=5.0;
pub const SEGMENT_DURATION_MIN_RANGE: RangeInclusive<u32> = 1..=10;

/// Resolved settings for one batch.
///
/// Built and validated once, then shared read-only by every item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Shortest silence removed by the trimmer. Default: 1000.
    pub min_silence_ms: u64,
    /// Window level (dBFS) under which audio counts as silence. Default: -40.
    pub silence_threshold_db: f32,
    /// Length of the leading noise reference. Default: 1.
    pub noise_sample_secs: f32,
    /// Segment length in minutes. Default: 5.
    pub segment_duration_min: u32,
    pub output_format: AudioFormat,
    pub segmentation_enabled: bool,
    pub noise_reduction_enabled: bool,
    /// Emit the whole processed waveform as `{base}_limpio.{ext}`.
    pub export_cleaned: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_silence_ms: 1_000,
            silence_threshold_db: -40.0,
            noise_sample_secs: 1.0,
            segment_duration_min: 5,
            output_format: AudioFormat::Wav,
            segmentation_enabled: true,
            noise_reduction_enabled: true,
            export_cleaned: true,
        }
    }
}

impl PipelineConfig {
    /// Reject values outside the supported ranges.
    ///
    /// # Errors
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !MIN_SILENCE_MS_RANGE.contains(&self.min_silence_ms) {
            return Err(out_of_range(
                "minSilenceMs",
                self.min_silence_ms,
                &MIN_SILENCE_MS_RANGE,
            ));
        }
        if !SILENCE_THRESHOLD_DB_RANGE.contains(&self.silence_threshold_db) {
            return Err(out_of_range(
                "silenceThresholdDb",
                self.silence_threshold_db,
                &SILENCE_THRESHOLD_DB_RANGE,
            ));
        }
        if !NOISE_SAMPLE_SECS_RANGE.contains(&self.noise_sample_secs) {
            return Err(out_of_range(
                "noiseSampleSecs",
                self.noise_sample_secs,
                &NOISE_SAMPLE_SECS_RANGE,
            ));
        }
        if !SEGMENT_DURATION_MIN_RANGE.contains(&self.segment_duration_min) {
            return Err(out_of_range(
                "segmentDurationMin",
                self.segment_duration_min,
                &SEGMENT_DURATION_MIN_RANGE,
            ));
        }
        Ok(())
    }

    /// `validate` and return `self`.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

fn out_of_range<T: std::fmt::Display>(
    field: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> AudioCleanError {
    AudioCleanError::InvalidConfig(format!(
        "{field} = {value} is outside [{}, {}]",
        range.start(),
        range.end()
    ))
}
