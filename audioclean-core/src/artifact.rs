//! Output artifacts handed back to the caller, and their naming rules.

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;

pub const ARCHIVE_MIME: &str = "application/zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ArtifactKind {
    /// The uploaded bytes, untouched.
    Original,
    /// The whole processed waveform.
    Cleaned,
    Segment { index: usize },
    Archive,
}

/// A named byte buffer ready for download.
#[derive(Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub name: String,
    pub mime: String,
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn new(
        name: impl Into<String>,
        mime: impl Into<String>,
        kind: ArtifactKind,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            kind,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for OutputArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputArtifact")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// File name without its final extension.
///
/// Directory components are dropped so artifact names stay flat.
pub fn base_name(file_name: &str) -> &str {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// `{base}_limpio.{ext}`
pub fn cleaned_file_name(base_name: &str, format: AudioFormat) -> String {
    format!("{base_name}_limpio.{}", format.extension())
}

/// `{base}_segmentos.zip`
pub fn archive_file_name(base_name: &str) -> String {
    format!("{base_name}_segmentos.zip")
}
