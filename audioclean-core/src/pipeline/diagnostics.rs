use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Lock-free counters updated by every worker of a pipeline.
#[derive(Debug, Default)]
pub struct PipelineDiagnostics {
    pub items_received: AtomicUsize,
    pub items_completed: AtomicUsize,
    pub items_failed: AtomicUsize,
    pub items_cancelled: AtomicUsize,
    pub silence_spans_removed: AtomicUsize,
    pub noise_reductions: AtomicUsize,
    pub segments_emitted: AtomicUsize,
    pub archives_built: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.items_received.store(0, Ordering::Relaxed);
        self.items_completed.store(0, Ordering::Relaxed);
        self.items_failed.store(0, Ordering::Relaxed);
        self.items_cancelled.store(0, Ordering::Relaxed);
        self.silence_spans_removed.store(0, Ordering::Relaxed);
        self.noise_reductions.store(0, Ordering::Relaxed);
        self.segments_emitted.store(0, Ordering::Relaxed);
        self.archives_built.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            items_received: self.items_received.load(Ordering::Relaxed),
            items_completed: self.items_completed.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            items_cancelled: self.items_cancelled.load(Ordering::Relaxed),
            silence_spans_removed: self.silence_spans_removed.load(Ordering::Relaxed),
            noise_reductions: self.noise_reductions.load(Ordering::Relaxed),
            segments_emitted: self.segments_emitted.load(Ordering::Relaxed),
            archives_built: self.archives_built.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub items_received: usize,
    pub items_completed: usize,
    pub items_failed: usize,
    /// Subset of `items_failed`.
    pub items_cancelled: usize,
    pub silence_spans_removed: usize,
    pub noise_reductions: usize,
    pub segments_emitted: usize,
    pub archives_built: usize,
}
