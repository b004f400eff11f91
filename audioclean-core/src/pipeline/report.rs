//! Batch inputs and outcomes.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::diagnostics::DiagnosticsSnapshot;
use super::state::Stage;
use crate::artifact::{base_name, OutputArtifact};
use crate::audio::AudioFormat;
use crate::error::{AudioCleanError, Result};

/// One uploaded file: original name plus raw bytes.
#[derive(Clone)]
pub struct UploadedAudio {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedAudio {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    /// Name without extension; prefix of every derived artifact name.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// Source format from the file extension.
    pub fn format(&self) -> Result<AudioFormat> {
        AudioFormat::from_file_name(&self.name)
    }
}

impl std::fmt::Debug for UploadedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedAudio")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Measurements collected while an item moves through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub sample_rate: u32,
    pub channels: u16,
    pub input_duration_ms: u64,
    /// Level before normalization; `None` for silent input.
    pub input_level_dbfs: Option<f32>,
    pub gain_db: f32,
    pub silence_spans_removed: usize,
    pub silence_removed_ms: u64,
    pub noise_reduced: bool,
    pub output_duration_ms: u64,
    pub segments: usize,
}

/// Artifacts and stats of an item that reached `Done`.
#[derive(Debug, Clone)]
pub struct ItemOutput {
    /// Original, cleaned, segments, archive, in that order.
    pub artifacts: Vec<OutputArtifact>,
    pub stats: ItemStats,
}

/// Why and where an item stopped.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct ItemFailure {
    pub stage: Stage,
    #[source]
    pub error: AudioCleanError,
}

impl ItemFailure {
    pub fn new(stage: Stage, error: AudioCleanError) -> Self {
        Self { stage, error }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, AudioCleanError::Cancelled)
    }
}

#[derive(Debug)]
pub struct ItemReport {
    /// Position of the item in its batch.
    pub index: usize,
    pub name: String,
    pub outcome: std::result::Result<ItemOutput, ItemFailure>,
}

impl ItemReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&ItemOutput> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        self.outcome.as_ref().err()
    }

    pub fn artifacts(&self) -> &[OutputArtifact] {
        self.output().map_or(&[], |out| out.artifacts.as_slice())
    }
}

/// Per-item reports in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    /// Pipeline counters as of the end of the batch.
    pub diagnostics: DiagnosticsSnapshot,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}
