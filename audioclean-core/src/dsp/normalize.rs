//! Gain normalization to the 0 dBFS RMS reference.
//!
//! The gain is uniform: every sample is scaled by the same factor so the RMS
//! level becomes 0 dBFS (net change = `-current_dbfs`). Peaks may exceed full
//! scale afterwards; encoders clamp.

use tracing::debug;

use crate::audio::level::{db_to_gain, rms_dbfs};
use crate::audio::Waveform;

/// Gains smaller than this (in dB) are treated as "already normalized".
pub const GAIN_EPSILON_DB: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOutcome {
    /// RMS level before normalization. `-inf` for silent input.
    pub level_before_dbfs: f32,
    /// Gain actually applied; `0.0` when the waveform was left untouched.
    pub gain_db: f32,
}

impl NormalizeOutcome {
    pub fn applied(&self) -> bool {
        self.gain_db != 0.0
    }
}

/// Normalize `waveform` so its RMS level is 0 dBFS.
///
/// Silent (zero-energy) and empty waveforms are returned unchanged.
pub fn normalize(waveform: Waveform) -> Waveform {
    normalize_with_outcome(waveform).0
}

/// Like [`normalize`], also reporting the measured level and applied gain.
pub fn normalize_with_outcome(mut waveform: Waveform) -> (Waveform, NormalizeOutcome) {
    let level = rms_dbfs(waveform.samples());

    if !level.is_finite() {
        debug!("silent input, normalization skipped");
        return (
            waveform,
            NormalizeOutcome {
                level_before_dbfs: level,
                gain_db: 0.0,
            },
        );
    }

    let gain_db = -level;
    if gain_db.abs() < GAIN_EPSILON_DB {
        return (
            waveform,
            NormalizeOutcome {
                level_before_dbfs: level,
                gain_db: 0.0,
            },
        );
    }

    let gain = db_to_gain(gain_db);
    for s in waveform.samples_mut() {
        *s *= gain;
    }
    debug!(
        level_before_dbfs = format_args!("{level:.2}"),
        gain_db = format_args!("{gain_db:.2}"),
        "normalized"
    );

    (
        waveform,
        NormalizeOutcome {
            level_before_dbfs: level,
            gain_db,
        },
    )
}
