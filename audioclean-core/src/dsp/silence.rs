//! Silence detection and removal.
//!
//! ## Algorithm
//!
//! 1. Slice the waveform into fixed analysis windows (10 ms; the last one may
//!    be partial).
//! 2. A window is silent when its RMS level is below `threshold_db` dBFS.
//! 3. A maximal run of silent windows lasting at least `min_silence_ms` is a
//!    [`SilenceSpan`].
//! 4. Every span is cut and the remaining regions are joined in order, with
//!    no crossfade.
//!
//! Span boundaries land on window edges, never mid-window. Because each cut
//! removes whole windows, the kept windows stay on the same grid, so a second
//! pass with the same parameters finds nothing left to remove.

use tracing::debug;

use crate::audio::level::rms_dbfs;
use crate::audio::Waveform;

/// Analysis window length.
pub const ANALYSIS_WINDOW_MS: u64 = 10;

/// Half-open frame interval `[start, end)` classified as silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceSpan {
    pub start: usize,
    pub end: usize,
}

impl SilenceSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrimOutcome {
    pub spans_removed: usize,
    pub frames_removed: usize,
}

/// Energy-threshold silence trimmer.
#[derive(Debug, Clone, Copy)]
pub struct SilenceTrimmer {
    min_silence_ms: u64,
    threshold_db: f32,
    window_ms: u64,
}

impl SilenceTrimmer {
    /// # Parameters
    /// - `min_silence_ms`: shortest run of silence that gets cut.
    /// - `threshold_db`: window RMS level (dBFS) below which a window is silent.
    pub fn new(min_silence_ms: u64, threshold_db: f32) -> Self {
        Self {
            min_silence_ms,
            threshold_db,
            window_ms: ANALYSIS_WINDOW_MS,
        }
    }

    /// Override the analysis window length.
    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    fn window_frames(&self, waveform: &Waveform) -> usize {
        waveform.frames_for_ms(self.window_ms).max(1)
    }

    /// Find every silence span, in temporal order.
    pub fn detect(&self, waveform: &Waveform) -> Vec<SilenceSpan> {
        let total = waveform.frames();
        let window = self.window_frames(waveform);
        let min_frames = waveform.frames_for_ms(self.min_silence_ms);

        let mut spans = Vec::new();
        let mut run_start: Option<usize> = None;
        let close_run = |run_start: usize, end: usize, spans: &mut Vec<SilenceSpan>| {
            if end - run_start >= min_frames {
                spans.push(SilenceSpan {
                    start: run_start,
                    end,
                });
            }
        };

        let mut start = 0;
        while start < total {
            let end = (start + window).min(total);
            let silent = rms_dbfs(waveform.frame_slice(start..end)) < self.threshold_db;
            if silent {
                run_start.get_or_insert(start);
            } else if let Some(rs) = run_start.take() {
                close_run(rs, start, &mut spans);
            }
            start = end;
        }
        if let Some(rs) = run_start {
            close_run(rs, total, &mut spans);
        }

        spans
    }

    /// Remove every silence span and splice the rest together.
    ///
    /// An input that is silent throughout yields an empty waveform with the
    /// same layout.
    pub fn trim(&self, waveform: Waveform) -> (Waveform, TrimOutcome) {
        let spans = self.detect(&waveform);
        if spans.is_empty() {
            return (waveform, TrimOutcome::default());
        }

        let frames_removed: usize = spans.iter().map(SilenceSpan::len).sum();
        let kept_frames = waveform.frames() - frames_removed;
        let mut kept = Vec::with_capacity(kept_frames * waveform.channels() as usize);

        let mut cursor = 0;
        for span in &spans {
            kept.extend_from_slice(waveform.frame_slice(cursor..span.start));
            cursor = span.end;
        }
        kept.extend_from_slice(waveform.frame_slice(cursor..waveform.frames()));

        debug!(
            spans = spans.len(),
            frames_removed,
            kept_frames,
            "silence trimmed"
        );

        let outcome = TrimOutcome {
            spans_removed: spans.len(),
            frames_removed,
        };
        (waveform.with_samples(kept), outcome)
    }
}

/// Spans of `waveform` that [`trim`] would remove.
pub fn detect_silence(
    waveform: &Waveform,
    min_silence_ms: u64,
    threshold_db: f32,
) -> Vec<SilenceSpan> {
    SilenceTrimmer::new(min_silence_ms, threshold_db).detect(waveform)
}

/// Remove silence spans of at least `min_silence_ms` below `threshold_db`.
pub fn trim(waveform: Waveform, min_silence_ms: u64, threshold_db: f32) -> Waveform {
    SilenceTrimmer::new(min_silence_ms, threshold_db)
        .trim(waveform)
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8_000;

    fn tone(secs: f32) -> Vec<f32> {
        let frames = (secs * SR as f32) as usize;
        (0..frames)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SR as f32).sin())
            .collect()
    }

    fn silence(secs: f32) -> Vec<f32> {
        vec![0.0; (secs * SR as f32) as usize]
    }

    fn mono(parts: &[Vec<f32>]) -> Waveform {
        Waveform::new(parts.concat(), SR, 1)
    }

    #[test]
    fn long_gap_is_removed() {
        let wf = mono(&[tone(1.0), silence(2.0), tone(1.0)]);
        let spans = detect_silence(&wf, 1_000, -40.0);
        assert_eq!(spans, vec![SilenceSpan { start: 8_000, end: 24_000 }]);

        let (out, outcome) = SilenceTrimmer::new(1_000, -40.0).trim(wf);
        assert_eq!(out.frames(), 16_000);
        assert_eq!(outcome.spans_removed, 1);
        assert_eq!(outcome.frames_removed, 16_000);
    }

    #[test]
    fn short_gap_is_kept() {
        let wf = mono(&[tone(1.0), silence(0.5), tone(1.0)]);
        let out = trim(wf.clone(), 1_000, -40.0);
        assert_eq!(out, wf);
    }

    #[test]
    fn leading_and_trailing_silence_removed() {
        let wf = mono(&[silence(1.5), tone(0.5), silence(1.2)]);
        let out = trim(wf, 1_000, -40.0);
        assert_eq!(out.frames(), 4_000);
    }

    #[test]
    fn quiet_noise_below_threshold_counts_as_silence() {
        let hiss: Vec<f32> = (0..16_000)
            .map(|i| if i % 2 == 0 { 0.003 } else { -0.003 })
            .collect();
        let wf = mono(&[tone(1.0), hiss, tone(1.0)]);
        let out = trim(wf, 1_000, -40.0);
        assert_eq!(out.frames(), 16_000);
    }

    #[test]
    fn all_silent_input_becomes_empty() {
        let wf = mono(&[silence(10.0)]);
        let out = trim(wf, 1_000, -40.0);
        assert!(out.is_empty());
        assert_eq!(out.sample_rate(), SR);
        assert_eq!(out.channels(), 1);
    }

    #[test]
    fn silence_shorter_than_minimum_is_never_removed_even_if_whole_input() {
        let wf = mono(&[silence(0.5)]);
        assert_eq!(trim(wf.clone(), 1_000, -40.0), wf);
    }

    #[test]
    fn empty_input_is_unchanged() {
        let wf = Waveform::new(Vec::new(), SR, 2);
        assert!(detect_silence(&wf, 300, -40.0).is_empty());
        assert_eq!(trim(wf.clone(), 300, -40.0), wf);
    }

    #[test]
    fn trimming_is_idempotent() {
        // Odd lengths so the final analysis window is partial.
        let mut last = tone(0.31);
        last.truncate(2_437);
        let wf = mono(&[
            silence(0.7),
            tone(0.25),
            silence(1.13),
            tone(0.61),
            silence(0.2),
            tone(0.4),
            silence(0.9),
            last,
            silence(1.01),
        ]);
        let once = trim(wf, 800, -40.0);
        let twice = trim(once.clone(), 800, -40.0);
        assert_eq!(twice, once);
        assert!(detect_silence(&once, 800, -40.0).is_empty());
    }

    #[test]
    fn stereo_frames_stay_aligned() {
        let mut samples = Vec::new();
        for s in tone(1.0) {
            samples.push(s);
            samples.push(-s);
        }
        samples.extend(std::iter::repeat(0.0).take(2 * 12_000));
        for s in tone(0.5) {
            samples.push(s);
            samples.push(-s);
        }
        let wf = Waveform::new(samples, SR, 2);
        let out = trim(wf, 1_000, -40.0);
        assert_eq!(out.channels(), 2);
        assert_eq!(out.frames(), 12_000);
        assert!(out
            .samples()
            .chunks_exact(2)
            .all(|frame| (frame[0] + frame[1]).abs() < 1e-6));
    }

    #[test]
    fn span_edges_snap_to_windows() {
        // Silence starts 35 frames into a window.
        let mut lead = tone(1.0);
        lead.truncate(8_035);
        let wf = mono(&[lead, silence(2.0), tone(1.0)]);
        let spans = detect_silence(&wf, 1_000, -40.0);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start % 80, 0);
        assert!(spans[0].start >= 8_035);
    }
}
