//! # audioclean-core
//!
//! Batch audio cleaning pipeline.
//!
//! ## Architecture
//!
//! ```text
//! UploadedAudio ─► AudioCodec::decode ─► normalize ─► trim silence ─► [reduce noise]
//!                                                                          │
//!        OutputArtifacts ◄─ package ◄─ encode ◄─ [segment] ◄───────────────┘
//! ```
//!
//! [`Pipeline::run_batch`] runs every item through the stages inside one
//! scratch directory, isolates per-item failures, and broadcasts an
//! [`ItemStatusEvent`] on every state transition.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod archive;
pub mod artifact;
pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod pipeline;
pub mod scratch;

// Convenience re-exports for downstream crates
pub use artifact::{ArtifactKind, OutputArtifact};
pub use audio::{AudioCodec, AudioFormat, FfmpegCodec, NativeCodec, Waveform};
pub use config::PipelineConfig;
pub use dsp::{NoiseProfile, NoiseSuppressor, SpectralGate};
pub use error::{AudioCleanError, Result};
pub use pipeline::{
    BatchReport, CancelToken, DiagnosticsSnapshot, ItemFailure, ItemOutput, ItemReport,
    ItemState, ItemStats, ItemStatusEvent, Pipeline, Stage, UploadedAudio,
};
pub use scratch::ScratchSpace;
