//! Fixed-length window alignment.
//!
//! Turns a run-length-encoded hypnogram into one label per 30 s window and
//! cuts the matching samples out of the continuous signal:
//!
//! ```text
//! recording   |<-- margin -->|=========== truncated range ===========|<-- margin -->|
//! intervals          [ W ......... ][ 1 ][ 2 ......... ][ 3 ...][ R ..... ][ W ........ ]
//! crop               .............[W][ 1 ][ 2 ......... ][ 3 ...][ R ..][W]
//! chunk (30 s)                    |W|1|1|2|2|2|2|2|3|3|3|R|R|R|W|
//! ```
//!
//! Windows are contiguous and equal length, so
//! `count × window_secs == end − start` must hold exactly. Anything else
//! means the annotations or the recording are inconsistent and the record
//! is rejected.
use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use ndarray::{s, Array3};

use crate::edf::{AnnotationInterval, RawSignal};
use crate::labels::{remap, Label};

/// Tolerance for comparing second offsets that went through `f64` arithmetic.
const TIME_EPS: f64 = 1e-6;

/// Half-open span `[start, end)` in seconds from the recording start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(end > start) || start < 0.0 {
            bail!("invalid time range [{start}, {end})");
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Sample indices covering the range at `sfreq`.
    pub fn samples(&self, sfreq: f64) -> (usize, usize) {
        ((self.start * sfreq).round() as usize, (self.end * sfreq).round() as usize)
    }
}

/// One scoring window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    /// Position within the record, from 0.
    pub index: usize,
    /// Seconds from the recording start.
    pub onset: f64,
    /// Index of the first sample in the recording.
    pub first_sample: usize,
    pub label: Label,
}

// ── Truncation ranges ─────────────────────────────────────────────────────

/// Range left after cutting `margin_secs` from both ends of a recording.
pub fn truncation_range(duration_secs: f64, margin_secs: f64) -> Result<TimeRange> {
    let end = duration_secs - margin_secs;
    if end <= margin_secs {
        bail!(
            "recording of {duration_secs} s is too short for {margin_secs} s margins on both ends"
        );
    }
    TimeRange::new(margin_secs, end)
}

/// Range evaluated for a test record, from the first and last window start
/// listed in the submission template.
///
/// Offsets are whole seconds (truncated) and the end is extended by one
/// window so the last listed window is included.
pub fn eval_range(
    psg_start: NaiveDateTime,
    first: NaiveDateTime,
    last: NaiveDateTime,
    window_secs: f64,
) -> Result<TimeRange> {
    if first < psg_start {
        bail!("evaluation starts at {first}, before the recording starts at {psg_start}");
    }
    let start = (first - psg_start).num_seconds() as f64;
    let end = (last - psg_start).num_seconds() as f64 + window_secs;
    TimeRange::new(start, end)
}

// ── Annotation → window grid ──────────────────────────────────────────────

/// Clip intervals to `range`, dropping those entirely outside it.
pub fn crop(intervals: &[AnnotationInterval], range: TimeRange) -> Vec<AnnotationInterval> {
    intervals
        .iter()
        .filter_map(|a| {
            let onset = a.onset.max(range.start);
            let end = a.end().min(range.end);
            (end > onset).then(|| AnnotationInterval::new(onset, end - onset, a.description.clone()))
        })
        .collect()
}

/// Expand each interval into one `(onset, label)` per whole window it covers.
///
/// An interval of `D` seconds yields `floor(D / window_secs)` windows, all
/// with the interval's label; a trailing partial window is dropped. Labels
/// outside the sleep-stage vocabulary are an error.
pub fn chunk_intervals(
    intervals: &[AnnotationInterval],
    window_secs: f64,
) -> Result<Vec<(f64, Label)>> {
    let mut out = Vec::new();
    for a in intervals {
        let label = remap(&a.description)?;
        let n = (a.duration / window_secs + TIME_EPS).floor() as usize;
        out.extend((0..n).map(|i| (a.onset + i as f64 * window_secs, label)));
    }
    Ok(out)
}

/// Align hypnogram intervals with a training recording.
///
/// Crop → chunk → keep windows inside `range` → check coverage.
pub fn align_train(
    intervals: &[AnnotationInterval],
    range: TimeRange,
    window_secs: f64,
    sfreq: f64,
) -> Result<Vec<Window>> {
    let cropped = crop(intervals, range);
    let mut chunks: Vec<(f64, Label)> = chunk_intervals(&cropped, window_secs)?
        .into_iter()
        .filter(|&(onset, _)| {
            onset >= range.start - TIME_EPS && onset + window_secs <= range.end + TIME_EPS
        })
        .collect();
    chunks.sort_by(|a, b| a.0.total_cmp(&b.0));

    let windows: Vec<Window> = chunks
        .into_iter()
        .enumerate()
        .map(|(index, (onset, label))| Window {
            index,
            onset,
            first_sample: (onset * sfreq).round() as usize,
            label,
        })
        .collect();

    check_coverage(&windows, range, window_secs)?;
    Ok(windows)
}

/// Windows for a test recording: a fixed stride over `range`, placeholder labels.
pub fn align_test(range: TimeRange, window_secs: f64, sfreq: f64) -> Result<Vec<Window>> {
    let n = (range.duration() / window_secs + TIME_EPS).floor() as usize;
    let windows: Vec<Window> = (0..n)
        .map(|index| {
            let onset = range.start + index as f64 * window_secs;
            Window {
                index,
                onset,
                first_sample: (onset * sfreq).round() as usize,
                label: Label::PLACEHOLDER,
            }
        })
        .collect();

    check_coverage(&windows, range, window_secs)?;
    Ok(windows)
}

/// Verify that `windows` tile `range` exactly.
///
/// Fails when the duration is not a whole number of windows, when the count
/// differs, or when any window is not at `start + index × window_secs`.
pub fn check_coverage(windows: &[Window], range: TimeRange, window_secs: f64) -> Result<()> {
    let expected = range.duration() / window_secs;
    if (expected - expected.round()).abs() > TIME_EPS {
        bail!(
            "truncated range [{}, {}) is {} s, not a whole number of {window_secs} s windows",
            range.start,
            range.end,
            range.duration()
        );
    }
    let expected = expected.round() as usize;
    if windows.len() != expected {
        bail!(
            "{} windows × {window_secs} s != {} s truncated duration ({expected} windows expected)",
            windows.len(),
            range.duration()
        );
    }
    for (i, w) in windows.iter().enumerate() {
        let at = range.start + i as f64 * window_secs;
        if (w.onset - at).abs() > TIME_EPS {
            bail!("window {i} starts at {} s, expected {at} s (gap or overlap in annotations)", w.onset);
        }
    }
    Ok(())
}

// ── Sample extraction ─────────────────────────────────────────────────────

/// Cut `windows` out of `signal` into a `[E, C, n_samples]` array.
///
/// Every window must lie inside the samples `signal` holds.
pub fn epoch(signal: &RawSignal, windows: &[Window], n_samples: usize) -> Result<Array3<f64>> {
    let n_ch = signal.data.nrows();
    let mut out = Array3::<f64>::zeros((windows.len(), n_ch, n_samples));
    for (e, w) in windows.iter().enumerate() {
        let end = w.first_sample + n_samples;
        if w.first_sample < signal.first_sample || end > signal.end_sample() {
            bail!(
                "window {} (samples {}..{end}) outside loaded signal {}..{}",
                w.index,
                w.first_sample,
                signal.first_sample,
                signal.end_sample()
            );
        }
        let lo = w.first_sample - signal.first_sample;
        out.slice_mut(s![e, .., ..])
            .assign(&signal.data.slice(s![.., lo..lo + n_samples]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::SleepStage;
    use ndarray::Array2;

    fn iv(onset: f64, duration: f64, desc: &str) -> AnnotationInterval {
        AnnotationInterval::new(onset, duration, desc)
    }

    #[test]
    fn chunk_counts_whole_windows() {
        let chunks = chunk_intervals(&[iv(0.0, 95.0, "Sleep stage 2")], 30.0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].0, 60.0);
    }

    #[test]
    fn crop_clips_edges() {
        let range = TimeRange::new(100.0, 200.0).unwrap();
        let cropped = crop(&[iv(0.0, 130.0, "A"), iv(130.0, 200.0, "B"), iv(300.0, 30.0, "C")], range);
        assert_eq!(cropped, vec![iv(100.0, 30.0, "A"), iv(130.0, 70.0, "B")]);
    }

    #[test]
    fn truncation_rejects_short_recordings() {
        assert!(truncation_range(9.0 * 3600.0, 18000.0).is_err());
        let r = truncation_range(86400.0, 18000.0).unwrap();
        assert_eq!((r.start, r.end), (18000.0, 68400.0));
    }

    #[test]
    fn gap_in_annotations_is_fatal() {
        let range = TimeRange::new(0.0, 120.0).unwrap();
        let intervals = [iv(0.0, 30.0, "Sleep stage W"), iv(60.0, 60.0, "Sleep stage 1")];
        let err = align_train(&intervals, range, 30.0, 100.0).unwrap_err();
        assert!(err.to_string().contains("windows"), "{err}");
    }

    #[test]
    fn fractional_range_is_fatal() {
        let range = TimeRange::new(0.0, 100.0).unwrap();
        assert!(align_test(range, 30.0, 100.0).is_err());
    }

    #[test]
    fn epoch_extracts_window_samples() {
        let data = Array2::from_shape_fn((1, 600), |(_, t)| t as f64);
        let signal = RawSignal {
            data,
            sfreq: 10.0,
            start: chrono::NaiveDateTime::default(),
            ch_names: vec!["EEG".into()],
            first_sample: 300,
        };
        let range = TimeRange::new(30.0, 90.0).unwrap();
        let windows = align_test(range, 30.0, 10.0).unwrap();
        let epochs = epoch(&signal, &windows, 300).unwrap();
        assert_eq!(epochs.shape(), &[2, 1, 300]);
        assert_eq!(epochs[[1, 0, 0]], 300.0);
        assert_eq!(windows[1].label, Label::Stage(SleepStage::Wake));
    }

    #[test]
    fn epoch_outside_signal_fails() {
        let signal = RawSignal {
            data: Array2::zeros((1, 100)),
            sfreq: 10.0,
            start: chrono::NaiveDateTime::default(),
            ch_names: vec!["EEG".into()],
            first_sample: 0,
        };
        let range = TimeRange::new(0.0, 30.0).unwrap();
        let windows = align_test(range, 30.0, 10.0).unwrap();
        assert!(epoch(&signal, &windows, 300).is_err());
    }
}
