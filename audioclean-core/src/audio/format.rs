use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AudioCleanError, Result};

/// Container formats the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Flac,
}

impl AudioFormat {
    /// Resolve a format from a file extension (`"MP3"`, `".wav"`, ...).
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            "flac" => Ok(Self::Flac),
            other => Err(AudioCleanError::UnsupportedFormat(format!(
                "unknown extension '{other}'"
            ))),
        }
    }

    /// Resolve a format from the extension of a file name.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                AudioCleanError::UnsupportedFormat(format!("'{name}' has no file extension"))
            })?;
        Self::from_extension(ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = AudioCleanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
    }
}
