use thiserror::Error;

/// All errors produced by audioclean-core.
///
/// Degenerate signals (all-silence, zero-length, silent normalization) are
/// never raised: the stages absorb them and return a minimal result.
#[derive(Debug, Error)]
pub enum AudioCleanError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("packaging failed: {0}")]
    Packaging(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("processing cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AudioCleanError>;
