//! Noise reduction against a leading reference window.
//!
//! The stage itself only picks the reference (the first N seconds, or the
//! whole waveform when it is shorter) and hands both to a
//! [`NoiseSuppressor`]. Any estimate-and-attenuate algorithm can sit behind
//! that trait; [`SpectralGate`] is the default.
//!
//! ## SpectralGate
//!
//! ```text
//! reference ─STFT (each channel)─▶ per-bin mean/std of dB magnitude ─▶ gate = mean + k·std
//! signal    ─STFT─▶ bin > gate ? 1 : 0 ─smooth─▶ gain ─iSTFT (weighted OLA)─▶ output
//! ```

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::debug;

use crate::audio::Waveform;

const DB_FLOOR: f32 = -200.0;

/// Per-frequency-bin summary of a noise reference.
///
/// Bin `k` covers `k * sample_rate / n_fft` Hz; there are `n_fft / 2 + 1` bins.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseProfile {
    pub mean_db: Vec<f32>,
    pub std_db: Vec<f32>,
    /// Bins of the signal at or below this level are treated as noise.
    pub threshold_db: Vec<f32>,
}

impl NoiseProfile {
    pub fn bins(&self) -> usize {
        self.threshold_db.len()
    }
}

/// Estimate-and-attenuate strategy used by [`reduce_noise`].
pub trait NoiseSuppressor: Send + Sync {
    /// Summarise the noise in `reference`.
    fn estimate(&self, reference: &Waveform) -> NoiseProfile;

    /// Attenuate `profile`-shaped noise across `waveform`.
    ///
    /// Must return a waveform of the same length and layout.
    fn attenuate(&self, waveform: Waveform, profile: &NoiseProfile) -> Waveform;
}

/// The first `noise_sample_secs` seconds of `waveform`, or all of it when
/// it is shorter than that.
pub fn noise_reference(waveform: &Waveform, noise_sample_secs: f32) -> Waveform {
    let frames = (noise_sample_secs.max(0.0) as f64 * waveform.sample_rate() as f64) as usize;
    if frames >= waveform.frames() {
        return waveform.clone();
    }
    waveform.slice_frames(0..frames)
}

/// Reduce noise in `waveform` using its first `noise_sample_secs` seconds as
/// the noise reference.
///
/// When the waveform is shorter than the window, it is its own reference and
/// comes out close to silence. Length, sample rate and channel count are
/// preserved. Empty input is returned as is.
pub fn reduce_noise(
    waveform: Waveform,
    noise_sample_secs: f32,
    suppressor: &dyn NoiseSuppressor,
) -> Waveform {
    if waveform.is_empty() {
        return waveform;
    }
    let reference = noise_reference(&waveform, noise_sample_secs);
    if reference.frames() == waveform.frames() {
        debug!(
            duration_secs = waveform.duration_secs(),
            noise_sample_secs, "waveform shorter than noise window, using whole signal as reference"
        );
    }
    let profile = suppressor.estimate(&reference);
    suppressor.attenuate(waveform, &profile)
}

/// Stationary spectral gate.
pub struct SpectralGate {
    n_fft: usize,
    hop: usize,
    /// Gate = mean + `n_std_thresh` × std (dB).
    n_std_thresh: f32,
    /// 1.0 removes gated bins completely, 0.0 leaves the signal untouched.
    prop_decrease: f32,
    /// Mask smoothing half-widths.
    freq_smooth_bins: usize,
    time_smooth_frames: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

impl SpectralGate {
    pub const DEFAULT_N_FFT: usize = 1024;

    pub fn new() -> Self {
        Self::with_fft_size(Self::DEFAULT_N_FFT)
    }

    /// Gate with an `n_fft`-point transform and a hop of `n_fft / 4`.
    pub fn with_fft_size(n_fft: usize) -> Self {
        let n_fft = n_fft.max(16);
        let mut planner = FftPlanner::<f32>::new();
        Self {
            n_fft,
            hop: n_fft / 4,
            n_std_thresh: 1.5,
            prop_decrease: 1.0,
            freq_smooth_bins: 1,
            time_smooth_frames: 2,
            window: build_hann_window(n_fft),
            fft: planner.plan_fft_forward(n_fft),
            ifft: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn with_threshold_std(mut self, n_std: f32) -> Self {
        self.n_std_thresh = n_std;
        self
    }

    pub fn with_prop_decrease(mut self, prop_decrease: f32) -> Self {
        self.prop_decrease = prop_decrease.clamp(0.0, 1.0);
        self
    }

    fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    fn framing(&self, len: usize) -> Framing {
        let pad = self.n_fft / 2;
        let min_len = len + 2 * pad;
        let frames = if min_len <= self.n_fft {
            1
        } else {
            (min_len - self.n_fft).div_ceil(self.hop) + 1
        };
        Framing {
            pad,
            frames,
            padded_len: (frames - 1) * self.hop + self.n_fft,
        }
    }

    fn pad(&self, signal: &[f32], framing: &Framing) -> Vec<f32> {
        let mut padded = vec![0.0f32; framing.padded_len];
        padded[framing.pad..framing.pad + signal.len()].copy_from_slice(signal);
        padded
    }

    fn analyze_frame(&self, padded: &[f32], frame: usize, buf: &mut [Complex<f32>]) {
        let start = frame * self.hop;
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
        }
        self.fft.process(buf);
    }

    /// Write the binary "signal" row for one analysed frame: 1 where the bin
    /// is above the gate.
    fn mask_row(&self, spectrum: &[Complex<f32>], profile: &NoiseProfile, row: &mut [u8]) {
        for (k, m) in row.iter_mut().enumerate() {
            let gate = profile.threshold_db.get(k).copied().unwrap_or(f32::NEG_INFINITY);
            *m = u8::from(magnitude_db(spectrum[k]) > gate);
        }
    }

    /// Single pass over the frames. Frame `f` is synthesised once the mask
    /// rows up to `f + time_smooth_frames` are known, so only a ring of
    /// `2 · time_smooth_frames + 1` spectra and mask rows is kept.
    fn gate_channel(&self, signal: &[f32], profile: &NoiseProfile) -> Vec<f32> {
        let framing = self.framing(signal.len());
        let padded = self.pad(signal, &framing);

        let n = self.n_fft;
        let half = n / 2;
        let bins = self.bins();
        let span = self.time_smooth_frames;
        let ring = 2 * span + 1;
        let scale = 1.0 / n as f32;

        let mut spectra = vec![vec![Complex::new(0.0f32, 0.0); n]; ring];
        let mut rows = vec![vec![0u8; bins]; ring];
        let mut window = MaskWindow::new(bins, self.freq_smooth_bins);
        let mut keep = vec![0.0f32; bins];
        let mut out = vec![0.0f32; framing.padded_len];
        let mut window_sum = vec![0.0f32; framing.padded_len];

        for next in 0..framing.frames + span {
            if next < framing.frames {
                let slot = next % ring;
                self.analyze_frame(&padded, next, &mut spectra[slot]);
                self.mask_row(&spectra[slot], profile, &mut rows[slot]);
                window.add(&rows[slot]);
            }
            let Some(frame) = next.checked_sub(span) else {
                continue;
            };

            window.keep_fractions(&mut keep);
            let buf = &mut spectra[frame % ring];
            for (k, c) in buf.iter_mut().enumerate() {
                let mirrored = if k <= half { k } else { n - k };
                *c *= 1.0 - self.prop_decrease * (1.0 - keep[mirrored]);
            }
            self.ifft.process(buf.as_mut_slice());

            let start = frame * self.hop;
            for i in 0..n {
                out[start + i] += buf[i].re * scale * self.window[i];
                window_sum[start + i] += self.window[i] * self.window[i];
            }

            if let Some(oldest) = frame.checked_sub(span) {
                window.remove(&rows[oldest % ring]);
            }
        }

        out[framing.pad..framing.pad + signal.len()]
            .iter()
            .zip(&window_sum[framing.pad..framing.pad + signal.len()])
            .map(|(&v, &w)| if w > 1e-8 { v / w } else { 0.0 })
            .collect()
    }
}

/// Running box sum of mask rows over time, with a `2 · freq + 1` bin box
/// applied on read through a prefix sum.
struct MaskWindow {
    column_sum: Vec<u32>,
    prefix: Vec<u32>,
    rows: u32,
    freq: usize,
}

impl MaskWindow {
    fn new(bins: usize, freq: usize) -> Self {
        Self {
            column_sum: vec![0; bins],
            prefix: vec![0; bins + 1],
            rows: 0,
            freq,
        }
    }

    fn add(&mut self, row: &[u8]) {
        for (sum, &m) in self.column_sum.iter_mut().zip(row) {
            *sum += u32::from(m);
        }
        self.rows += 1;
    }

    fn remove(&mut self, row: &[u8]) {
        for (sum, &m) in self.column_sum.iter_mut().zip(row) {
            *sum -= u32::from(m);
        }
        self.rows -= 1;
    }

    /// Fraction of "signal" cells in the box around each bin.
    fn keep_fractions(&mut self, out: &mut [f32]) {
        let bins = self.column_sum.len();
        for k in 0..bins {
            self.prefix[k + 1] = self.prefix[k] + self.column_sum[k];
        }
        for (k, keep) in out.iter_mut().enumerate().take(bins) {
            let lo = k.saturating_sub(self.freq);
            let hi = (k + self.freq).min(bins - 1);
            let cells = (hi - lo + 1) as u32 * self.rows.max(1);
            *keep = (self.prefix[hi + 1] - self.prefix[lo]) as f32 / cells as f32;
        }
    }
}

impl Default for SpectralGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpectralGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralGate")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .field("n_std_thresh", &self.n_std_thresh)
            .field("prop_decrease", &self.prop_decrease)
            .finish_non_exhaustive()
    }
}

impl NoiseSuppressor for SpectralGate {
    fn estimate(&self, reference: &Waveform) -> NoiseProfile {
        let bins = self.bins();
        let mut sum = vec![0.0f64; bins];
        let mut sum_sq = vec![0.0f64; bins];
        let mut buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut count = 0usize;

        // Frames of every channel are pooled, never downmixed.
        for c in 0..reference.channels() as usize {
            let channel = reference.channel(c);
            let framing = self.framing(channel.len());
            let padded = self.pad(&channel, &framing);
            for frame in 0..framing.frames {
                self.analyze_frame(&padded, frame, &mut buf);
                for k in 0..bins {
                    let db = magnitude_db(buf[k]) as f64;
                    sum[k] += db;
                    sum_sq[k] += db * db;
                }
            }
            count += framing.frames;
        }

        let n = count.max(1) as f64;
        let mut mean_db = Vec::with_capacity(bins);
        let mut std_db = Vec::with_capacity(bins);
        let mut threshold_db = Vec::with_capacity(bins);
        for k in 0..bins {
            let mean = sum[k] / n;
            let var = (sum_sq[k] / n - mean * mean).max(0.0);
            let std = var.sqrt();
            mean_db.push(mean as f32);
            std_db.push(std as f32);
            threshold_db.push((mean + self.n_std_thresh as f64 * std) as f32);
        }

        debug!(frames = count, bins, "noise profile estimated");

        NoiseProfile {
            mean_db,
            std_db,
            threshold_db,
        }
    }

    fn attenuate(&self, waveform: Waveform, profile: &NoiseProfile) -> Waveform {
        if waveform.is_empty() {
            return waveform;
        }
        let ch = waveform.channels() as usize;
        let mut out = vec![0.0f32; waveform.samples().len()];
        for c in 0..ch {
            let gated = self.gate_channel(&waveform.channel(c), profile);
            for (frame, v) in gated.into_iter().enumerate() {
                out[frame * ch + c] = v;
            }
        }
        waveform.with_samples(out)
    }
}

struct Framing {
    pad: usize,
    frames: usize,
    padded_len: usize,
}

fn build_hann_window(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

fn magnitude_db(c: Complex<f32>) -> f32 {
    let mag = c.norm();
    if mag > 0.0 {
        (20.0 * mag.log10()).max(DB_FLOOR)
    } else {
        DB_FLOOR
    }
}
