//! Per-item state machine and the status events broadcast on every transition.
//!
//! ```text
//! Received → Decoded → Normalized → Trimmed → [NoiseReduced] → [Segmented → Packaged] → Done
//!     └──────────────────────────── any state ─────────────────────────────────▶ Failed(stage)
//! ```

use serde::{Deserialize, Serialize};

/// Processing stage an item failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Decode,
    Normalize,
    Trim,
    NoiseReduce,
    Encode,
    Segment,
    Package,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Normalize => "normalize",
            Self::Trim => "trim",
            Self::NoiseReduce => "noisereduce",
            Self::Encode => "encode",
            Self::Segment => "segment",
            Self::Package => "package",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Received,
    Decoded,
    Normalized,
    Trimmed,
    /// Skipped when noise reduction is disabled.
    NoiseReduced,
    /// Skipped, with `Packaged`, when segmentation is disabled.
    Segmented,
    Packaged,
    Done,
    Failed(Stage),
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Broadcast on every item state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatusEvent {
    /// Monotonically increasing across the pipeline's lifetime.
    pub seq: u64,
    /// Position of the item in its batch.
    pub index: usize,
    /// Original file name.
    pub item: String,
    pub state: ItemState,
    /// Optional human-readable detail (measurements, error message).
    pub detail: Option<String>,
}
