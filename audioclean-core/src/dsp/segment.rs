//! Fixed-duration partitioning.

use crate::audio::{AudioFormat, Waveform};

/// One fixed-duration piece of a waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 1-based position in the sequence.
    pub index: usize,
    /// Configured segment length; the final segment keeps this label even
    /// when it is shorter.
    pub duration_min: u32,
    pub waveform: Waveform,
}

impl Segment {
    /// `{base}_parte_{index}_{duration}min.{ext}`
    pub fn file_name(&self, base_name: &str, format: AudioFormat) -> String {
        segment_file_name(base_name, self.index, self.duration_min, format)
    }
}

pub fn segment_file_name(
    base_name: &str,
    index: usize,
    duration_min: u32,
    format: AudioFormat,
) -> String {
    format!(
        "{base_name}_parte_{index}_{duration_min}min.{}",
        format.extension()
    )
}

fn segment_frames(waveform: &Waveform, duration_min: u32) -> usize {
    waveform
        .frames_for_ms(u64::from(duration_min) * 60_000)
        .max(1)
}

/// Number of segments [`segment`] would produce.
pub fn segment_count(waveform: &Waveform, duration_min: u32) -> usize {
    waveform
        .frames()
        .div_ceil(segment_frames(waveform, duration_min))
}

/// Split `waveform` into consecutive `duration_min`-minute segments.
///
/// Every segment is full length except possibly the last, which is shorter
/// but never empty. Concatenating the segments reproduces the input sample
/// for sample. An empty waveform yields no segments.
pub fn segment(waveform: &Waveform, duration_min: u32) -> Vec<Segment> {
    let total = waveform.frames();
    let seg = segment_frames(waveform, duration_min);

    (0..segment_count(waveform, duration_min))
        .map(|i| {
            let start = i * seg;
            let end = (start + seg).min(total);
            Segment {
                index: i + 1,
                duration_min,
                waveform: waveform.slice_frames(start..end),
            }
        })
        .collect()
}
