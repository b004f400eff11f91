//! `Pipeline`: the batch orchestrator.
//!
//! ## Batch lifecycle
//!
//! ```text
//! Pipeline::new(config)            → config validated once
//!     └─► run_batch(items)         → ScratchSpace acquired
//!         ├─► process_item(0)      → Received → … → Done | Failed(stage)
//!         ├─► process_item(1)
//!         └─► …                    → ScratchSpace released, BatchReport returned
//! ```
//!
//! A failing item never stops the batch; its report records the stage and
//! cause and the next item starts.
//!
//! ## Threading
//!
//! With `workers > 1` items are pulled from a crossbeam queue by scoped OS
//! threads. Each item still runs its stages sequentially on one thread. The
//! only shared state is the read-only config, the codec/suppressor
//! strategies, the event sender, the diagnostics atomics and the scratch
//! space.

mod item;

pub mod diagnostics;
pub mod report;
pub mod state;

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug_span, info, warn};

use crate::{
    audio::{AudioCodec, NativeCodec},
    config::PipelineConfig,
    dsp::{NoiseSuppressor, SpectralGate},
    error::Result,
    scratch::ScratchSpace,
};

pub use diagnostics::{DiagnosticsSnapshot, PipelineDiagnostics};
pub use report::{BatchReport, ItemFailure, ItemOutput, ItemReport, ItemStats, UploadedAudio};
pub use state::{ItemState, ItemStatusEvent, Stage};

/// Status events buffered for slow subscribers.
const BROADCAST_CAP: usize = 256;

/// Shared cancellation flag, checked between stages.
///
/// Cancelling does not interrupt a stage already running; the item fails
/// with `Cancelled` at the next stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The batch orchestrator.
///
/// `Pipeline` is `Send + Sync`; `run_batch` borrows it from every worker.
pub struct Pipeline {
    config: PipelineConfig,
    codec: Arc<dyn AudioCodec>,
    suppressor: Arc<dyn NoiseSuppressor>,
    workers: usize,
    scratch_root: Option<PathBuf>,
    cancel: CancelToken,
    status_tx: broadcast::Sender<ItemStatusEvent>,
    seq: AtomicU64,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl Pipeline {
    /// Validate `config` and build a sequential pipeline with the native
    /// codec and the default spectral gate.
    ///
    /// # Errors
    /// `InvalidConfig` when a setting is out of range.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Ok(Self {
            config,
            codec: Arc::new(NativeCodec::new()),
            suppressor: Arc::new(SpectralGate::default()),
            workers: 1,
            scratch_root: None,
            cancel: CancelToken::new(),
            status_tx,
            seq: AtomicU64::new(0),
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn AudioCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_suppressor(mut self, suppressor: Arc<dyn NoiseSuppressor>) -> Self {
        self.suppressor = suppressor;
        self
    }

    /// Number of items processed concurrently. `0` is treated as `1`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Create batch scratch directories under `root` instead of the system
    /// temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Subscribe to item status events.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemStatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn acquire_scratch(&self) -> Result<ScratchSpace> {
        match &self.scratch_root {
            Some(root) => ScratchSpace::new_in(root),
            None => ScratchSpace::new(),
        }
    }

    /// Process every item inside one scratch space.
    ///
    /// Reports come back in input order whatever the worker count. The
    /// scratch space is released before returning.
    ///
    /// # Errors
    /// Only when the scratch space cannot be created; item failures are
    /// reported per item.
    pub fn run_batch(&self, items: &[UploadedAudio]) -> Result<BatchReport> {
        let scratch = self.acquire_scratch()?;
        info!(
            items = items.len(),
            workers = self.workers,
            format = %self.config.output_format,
            "batch started"
        );

        let reports = if self.workers <= 1 || items.len() <= 1 {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| self.process_item(index, item, &scratch))
                .collect()
        } else {
            self.run_parallel(items, &scratch)
        };

        if let Err(e) = scratch.close() {
            warn!("failed to remove scratch space: {e}");
        }

        let report = BatchReport {
            items: reports,
            diagnostics: self.diagnostics.snapshot(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }

    fn run_parallel(&self, items: &[UploadedAudio], scratch: &ScratchSpace) -> Vec<ItemReport> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<usize>();
        for index in 0..items.len() {
            // Receiver is alive until the scope below ends.
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        let slots: Mutex<Vec<Option<ItemReport>>> =
            Mutex::new(items.iter().map(|_| None).collect());
        let workers = self.workers.min(items.len());

        std::thread::scope(|scope| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let slots = &slots;
                scope.spawn(move || {
                    let _span = debug_span!("worker", worker).entered();
                    for index in job_rx.iter() {
                        let report = self.process_item(index, &items[index], scratch);
                        slots.lock()[index] = Some(report);
                    }
                });
            }
        });

        slots.into_inner().into_iter().flatten().collect()
    }

    fn emit(&self, index: usize, item: &UploadedAudio, state: ItemState, detail: Option<String>) {
        let event = ItemStatusEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            index,
            item: item.name.clone(),
            state,
            detail,
        };
        // No subscribers is fine.
        let _ = self.status_tx.send(event);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("workers", &self.workers)
            .field("scratch_root", &self.scratch_root)
            .finish_non_exhaustive()
    }
}
