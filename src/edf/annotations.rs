//! EDF+ annotation reader.
//!
//! Annotations live in a pseudo-signal labelled `EDF Annotations` whose
//! "samples" are text. Each data record holds a sequence of Time-stamped
//! Annotation Lists (TALs):
//!
//! ```text
//! +Onset[\x15Duration]\x14Description\x14[Description\x14…]\x00
//! ```
//!
//! The first TAL of every record only keeps time (no description) and is
//! skipped. Unused record space is filled with `\x00`.
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;

use super::raw::open_raw;

const TAL_END: u8 = 0x00;
const FIELD_SEP: u8 = 0x14;
const DURATION_SEP: u8 = 0x15;

/// One annotation: `[onset, onset + duration)` seconds carrying `description`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInterval {
    pub onset: f64,
    pub duration: f64,
    pub description: String,
}

impl AnnotationInterval {
    pub fn new(onset: f64, duration: f64, description: impl Into<String>) -> Self {
        Self { onset, duration, description: description.into() }
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

/// All annotations from one file, with onsets relative to `start`.
#[derive(Debug, Clone)]
pub struct Annotations {
    pub start: NaiveDateTime,
    pub intervals: Vec<AnnotationInterval>,
}

impl Annotations {
    /// Intervals with onsets re-expressed relative to `origin`.
    ///
    /// A hypnogram may start at a different wall-clock time than the PSG it
    /// annotates; aligning against the PSG start keeps both on one axis.
    pub fn relative_to(&self, origin: NaiveDateTime) -> Vec<AnnotationInterval> {
        let shift = (self.start - origin).num_milliseconds() as f64 / 1000.0;
        self.intervals
            .iter()
            .map(|a| AnnotationInterval { onset: a.onset + shift, ..a.clone() })
            .collect()
    }
}

/// Read every annotation from an EDF+ file.
pub fn read_annotations<P: AsRef<Path>>(path: P) -> Result<Annotations> {
    let path = path.as_ref();
    let raw = open_raw(path)?;
    if !raw.header.is_edf_plus() {
        tracing::warn!(path = %path.display(), "annotation file is not marked EDF+");
    }
    let channels: Vec<usize> = raw
        .header
        .signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_annotation())
        .map(|(i, _)| i)
        .collect();
    if channels.is_empty() {
        bail!("{}: no \"EDF Annotations\" signal", path.display());
    }

    let mut intervals = Vec::new();
    for &ch in &channels {
        for (r, bytes) in raw.read_signal_bytes(ch)?.iter().enumerate() {
            let tals = parse_tals(bytes)
                .with_context(|| format!("{}: data record {r}", path.display()))?;
            intervals.extend(tals);
        }
    }
    intervals.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    tracing::debug!(path = %path.display(), n = intervals.len(), "read annotations");
    Ok(Annotations { start: raw.header.start, intervals })
}

/// Parse the TALs in one record's annotation bytes.
///
/// Each description in a TAL becomes its own interval. A missing duration
/// is read as zero.
pub fn parse_tals(bytes: &[u8]) -> Result<Vec<AnnotationInterval>> {
    let mut out = Vec::new();
    for tal in bytes.split(|&b| b == TAL_END).filter(|t| !t.is_empty()) {
        let mut fields = tal.split(|&b| b == FIELD_SEP);
        let timing = fields.next().unwrap_or_default();
        let (onset, duration) = parse_timing(timing)?;
        for desc in fields.filter(|d| !d.is_empty()) {
            let description = String::from_utf8_lossy(desc).trim().to_string();
            out.push(AnnotationInterval { onset, duration, description });
        }
    }
    Ok(out)
}

fn parse_timing(timing: &[u8]) -> Result<(f64, f64)> {
    let text = String::from_utf8_lossy(timing);
    let mut parts = text.split(DURATION_SEP as char);
    let onset_str = parts.next().unwrap_or_default().trim();
    if !onset_str.starts_with(['+', '-']) {
        bail!("TAL onset {onset_str:?} lacks a sign");
    }
    let onset: f64 = onset_str
        .parse()
        .with_context(|| format!("invalid TAL onset {onset_str:?}"))?;
    let duration = match parts.next().map(str::trim) {
        Some(d) if !d.is_empty() => d
            .parse()
            .with_context(|| format!("invalid TAL duration {d:?}"))?,
        _ => 0.0,
    };
    Ok((onset, duration))
}
