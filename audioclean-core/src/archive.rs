//! Zip packaging of output artifacts for single-download delivery.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifact::{ArtifactKind, OutputArtifact, ARCHIVE_MIME};
use crate::error::{AudioCleanError, Result};

/// Bundle `artifacts` into an in-memory zip archive.
///
/// Entries carry the artifact names, in input order. No artifacts gives a
/// valid empty archive.
///
/// # Errors
/// `Packaging` for any zip or IO fault, including duplicate entry names.
pub fn package(artifacts: &[OutputArtifact]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for artifact in artifacts {
        zip.start_file(artifact.name.as_str(), options)
            .map_err(|err| AudioCleanError::Packaging(format!("{}: {err}", artifact.name)))?;
        zip.write_all(&artifact.bytes)
            .map_err(|err| AudioCleanError::Packaging(format!("{}: {err}", artifact.name)))?;
    }

    let bytes = zip
        .finish()
        .map_err(|err| AudioCleanError::Packaging(err.to_string()))?
        .into_inner();

    debug!(entries = artifacts.len(), bytes = bytes.len(), "archive built");
    Ok(bytes)
}

/// [`package`] wrapped as an archive artifact named `name`.
pub fn package_artifact(name: String, artifacts: &[OutputArtifact]) -> Result<OutputArtifact> {
    let bytes = package(artifacts)?;
    Ok(OutputArtifact::new(name, ARCHIVE_MIME, ArtifactKind::Archive, bytes))
}
