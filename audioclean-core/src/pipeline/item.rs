//! Stage sequence for one uploaded item.

use std::sync::atomic::Ordering;

use tracing::{debug, info, info_span, warn};

use super::report::{ItemFailure, ItemOutput, ItemReport, ItemStats, UploadedAudio};
use super::state::{ItemState, Stage};
use super::Pipeline;
use crate::archive::package_artifact;
use crate::artifact::{archive_file_name, cleaned_file_name, ArtifactKind, OutputArtifact};
use crate::audio::Waveform;
use crate::dsp::normalize::normalize_with_outcome;
use crate::dsp::{reduce_noise, segment, SilenceTrimmer};
use crate::error::AudioCleanError;
use crate::scratch::ScratchSpace;

type StageResult<T> = std::result::Result<T, ItemFailure>;

fn at(stage: Stage) -> impl FnOnce(AudioCleanError) -> ItemFailure {
    move |error| ItemFailure::new(stage, error)
}

impl Pipeline {
    /// Run one item through every enabled stage.
    ///
    /// Never fails as a whole: a stage error is captured in the returned
    /// report together with the stage it happened in.
    pub fn process_item(
        &self,
        index: usize,
        item: &UploadedAudio,
        scratch: &ScratchSpace,
    ) -> ItemReport {
        let _span = info_span!("item", index, name = %item.name).entered();
        self.diagnostics.items_received.fetch_add(1, Ordering::Relaxed);
        self.emit(index, item, ItemState::Received, None);

        let outcome = self.run_stages(index, item, scratch);
        match &outcome {
            Ok(output) => {
                self.diagnostics
                    .items_completed
                    .fetch_add(1, Ordering::Relaxed);
                info!(
                    artifacts = output.artifacts.len(),
                    segments = output.stats.segments,
                    output_ms = output.stats.output_duration_ms,
                    "item done"
                );
                self.emit(index, item, ItemState::Done, None);
            }
            Err(failure) => {
                self.diagnostics.items_failed.fetch_add(1, Ordering::Relaxed);
                if failure.is_cancelled() {
                    self.diagnostics
                        .items_cancelled
                        .fetch_add(1, Ordering::Relaxed);
                }
                warn!(stage = %failure.stage, "item failed: {}", failure.error);
                self.emit(
                    index,
                    item,
                    ItemState::Failed(failure.stage),
                    Some(failure.error.to_string()),
                );
            }
        }

        ItemReport {
            index,
            name: item.name.clone(),
            outcome,
        }
    }

    fn checkpoint(&self, next: Stage) -> StageResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ItemFailure::new(next, AudioCleanError::Cancelled));
        }
        Ok(())
    }

    fn run_stages(
        &self,
        index: usize,
        item: &UploadedAudio,
        scratch: &ScratchSpace,
    ) -> StageResult<ItemOutput> {
        let config = &self.config;
        let format = config.output_format;
        let base = item.base_name();
        let mut stats = ItemStats::default();

        // ── Decode ────────────────────────────────────────────────────────
        self.checkpoint(Stage::Decode)?;
        let source_format = item.format().map_err(at(Stage::Decode))?;
        let waveform = self
            .codec
            .decode(&item.bytes, source_format)
            .map_err(at(Stage::Decode))?;
        stats.sample_rate = waveform.sample_rate();
        stats.channels = waveform.channels();
        stats.input_duration_ms = waveform.duration_ms();
        self.emit(
            index,
            item,
            ItemState::Decoded,
            Some(format!(
                "{} ms, {} Hz, {} ch",
                stats.input_duration_ms, stats.sample_rate, stats.channels
            )),
        );

        // ── Normalize ─────────────────────────────────────────────────────
        self.checkpoint(Stage::Normalize)?;
        let (waveform, level) = normalize_with_outcome(waveform);
        stats.input_level_dbfs = level
            .level_before_dbfs
            .is_finite()
            .then_some(level.level_before_dbfs);
        stats.gain_db = level.gain_db;
        self.emit(
            index,
            item,
            ItemState::Normalized,
            Some(format!("gain {:+.2} dB", level.gain_db)),
        );

        // ── Trim silence ──────────────────────────────────────────────────
        self.checkpoint(Stage::Trim)?;
        let (mut waveform, trimmed) =
            SilenceTrimmer::new(config.min_silence_ms, config.silence_threshold_db).trim(waveform);
        stats.silence_spans_removed = trimmed.spans_removed;
        stats.silence_removed_ms =
            trimmed.frames_removed as u64 * 1_000 / u64::from(waveform.sample_rate());
        self.diagnostics
            .silence_spans_removed
            .fetch_add(trimmed.spans_removed, Ordering::Relaxed);
        self.emit(
            index,
            item,
            ItemState::Trimmed,
            Some(format!(
                "{} spans, {} ms removed",
                trimmed.spans_removed, stats.silence_removed_ms
            )),
        );

        // ── Noise reduction (optional) ────────────────────────────────────
        if config.noise_reduction_enabled {
            self.checkpoint(Stage::NoiseReduce)?;
            waveform = reduce_noise(waveform, config.noise_sample_secs, self.suppressor.as_ref());
            stats.noise_reduced = true;
            self.diagnostics
                .noise_reductions
                .fetch_add(1, Ordering::Relaxed);
            self.emit(index, item, ItemState::NoiseReduced, None);
        }
        stats.output_duration_ms = waveform.duration_ms();
        debug!(
            output_ms = stats.output_duration_ms,
            frames = waveform.frames(),
            "cleaning finished"
        );

        let mut artifacts = vec![OutputArtifact::new(
            item.name.clone(),
            source_format.mime_type(),
            ArtifactKind::Original,
            item.bytes.clone(),
        )];

        // ── Cleaned export (optional) ─────────────────────────────────────
        if config.export_cleaned {
            self.checkpoint(Stage::Encode)?;
            let bytes = self.encode(&waveform, scratch)?;
            artifacts.push(OutputArtifact::new(
                cleaned_file_name(base, format),
                format.mime_type(),
                ArtifactKind::Cleaned,
                bytes,
            ));
        }

        // ── Segment + package (optional) ──────────────────────────────────
        if config.segmentation_enabled {
            self.checkpoint(Stage::Segment)?;
            let segments = segment(&waveform, config.segment_duration_min);
            drop(waveform);

            let mut pieces = Vec::with_capacity(segments.len());
            for seg in &segments {
                self.checkpoint(Stage::Encode)?;
                let bytes = self.encode(&seg.waveform, scratch)?;
                pieces.push(OutputArtifact::new(
                    seg.file_name(base, format),
                    format.mime_type(),
                    ArtifactKind::Segment { index: seg.index },
                    bytes,
                ));
            }
            stats.segments = pieces.len();
            self.diagnostics
                .segments_emitted
                .fetch_add(pieces.len(), Ordering::Relaxed);
            self.emit(
                index,
                item,
                ItemState::Segmented,
                Some(format!("{} segments", pieces.len())),
            );

            self.checkpoint(Stage::Package)?;
            let archive =
                package_artifact(archive_file_name(base), &pieces).map_err(at(Stage::Package))?;
            self.diagnostics
                .archives_built
                .fetch_add(1, Ordering::Relaxed);
            artifacts.extend(pieces);
            artifacts.push(archive);
            self.emit(index, item, ItemState::Packaged, None);
        }

        Ok(ItemOutput { artifacts, stats })
    }

    fn encode(&self, waveform: &Waveform, scratch: &ScratchSpace) -> StageResult<Vec<u8>> {
        self.codec
            .encode(waveform, self.config.output_format, scratch)
            .map_err(at(Stage::Encode))
    }
}
