//! Persistent CLI settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use audioclean_core::config::{
    MIN_SILENCE_MS_RANGE, NOISE_SAMPLE_SECS_RANGE, SEGMENT_DURATION_MIN_RANGE,
    SILENCE_THRESHOLD_DB_RANGE,
};
use audioclean_core::{AudioFormat, PipelineConfig};
use serde::{Deserialize, Serialize};

const MAX_JOBS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CliSettings {
    pub min_silence_ms: u64,
    pub silence_threshold_db: f32,
    pub noise_sample_secs: f32,
    pub segment_duration_min: u32,
    pub output_format: String,
    pub segmentation_enabled: bool,
    pub noise_reduction_enabled: bool,
    pub export_cleaned: bool,
    /// Path to an ffmpeg executable for mp3/flac output.
    pub ffmpeg_path: Option<String>,
    pub jobs: usize,
}

impl Default for CliSettings {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            min_silence_ms: config.min_silence_ms,
            silence_threshold_db: config.silence_threshold_db,
            noise_sample_secs: config.noise_sample_secs,
            segment_duration_min: config.segment_duration_min,
            output_format: config.output_format.extension().into(),
            segmentation_enabled: config.segmentation_enabled,
            noise_reduction_enabled: config.noise_reduction_enabled,
            export_cleaned: config.export_cleaned,
            ffmpeg_path: None,
            jobs: 1,
        }
    }
}

impl CliSettings {
    /// Clamp every value into its supported range.
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.min_silence_ms = self
            .min_silence_ms
            .clamp(*MIN_SILENCE_MS_RANGE.start(), *MIN_SILENCE_MS_RANGE.end());
        self.silence_threshold_db = clamp_finite(
            self.silence_threshold_db,
            defaults.silence_threshold_db,
            *SILENCE_THRESHOLD_DB_RANGE.start(),
            *SILENCE_THRESHOLD_DB_RANGE.end(),
        );
        self.noise_sample_secs = clamp_finite(
            self.noise_sample_secs,
            defaults.noise_sample_secs,
            *NOISE_SAMPLE_SECS_RANGE.start(),
            *NOISE_SAMPLE_SECS_RANGE.end(),
        );
        self.segment_duration_min = self.segment_duration_min.clamp(
            *SEGMENT_DURATION_MIN_RANGE.start(),
            *SEGMENT_DURATION_MIN_RANGE.end(),
        );
        self.output_format = normalize_output_format(&self.output_format);
        self.ffmpeg_path = self
            .ffmpeg_path
            .as_ref()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self.jobs = self.jobs.clamp(1, MAX_JOBS);
    }

    pub fn output_format(&self) -> AudioFormat {
        AudioFormat::from_extension(&self.output_format).unwrap_or_default()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            min_silence_ms: self.min_silence_ms,
            silence_threshold_db: self.silence_threshold_db,
            noise_sample_secs: self.noise_sample_secs,
            segment_duration_min: self.segment_duration_min,
            output_format: self.output_format(),
            segmentation_enabled: self.segmentation_enabled,
            noise_reduction_enabled: self.noise_reduction_enabled,
            export_cleaned: self.export_cleaned,
        }
    }
}

fn clamp_finite(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

pub fn normalize_output_format(raw: &str) -> String {
    AudioFormat::from_extension(raw)
        .unwrap_or_default()
        .extension()
        .into()
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("audioclean")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("audioclean")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> CliSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<CliSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &CliSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
