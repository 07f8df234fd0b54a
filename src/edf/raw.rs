//! Raw EDF signal reader.
//!
//! # Algorithm
//! 1. Open the file and parse the header.
//! 2. Resolve the data-record count (inferred from the file size when the
//!    header says `-1`) and check the file is long enough.
//! 3. On read, map the requested sample range onto data records, decode only
//!    those records, and copy the picked channels into a `[C, T]` array.
//!
//! Data-record layout (little-endian `i16`):
//! ```text
//! record r @ header_bytes + r × record_bytes
//! ┌──────────────────────┬──────────────────────┬─────┐
//! │ signal 0: spr₀ × i16 │ signal 1: spr₁ × i16 │ …   │
//! └──────────────────────┴──────────────────────┴─────┘
//! ```
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use ndarray::Array2;

use super::header::{read_header, EdfHeader, SignalHeader};

// ── RawSignal ─────────────────────────────────────────────────────────────

/// Decoded samples for a channel subset.
#[derive(Debug, Clone)]
pub struct RawSignal {
    /// `[C, T]` physical samples.
    pub data: Array2<f64>,
    /// Common sampling rate of the picked channels (Hz).
    pub sfreq: f64,
    /// Recording start from the file header.
    pub start: NaiveDateTime,
    /// Channel labels, one per row of `data`.
    pub ch_names: Vec<String>,
    /// Index of `data[.., 0]` in the full recording.
    pub first_sample: usize,
}

impl RawSignal {
    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// One past the last sample index held, in recording coordinates.
    #[inline]
    pub fn end_sample(&self) -> usize {
        self.first_sample + self.n_times()
    }
}

// ── RawEdf ────────────────────────────────────────────────────────────────

/// An opened EDF file; samples are decoded on demand.
#[derive(Debug, Clone)]
pub struct RawEdf {
    pub header: EdfHeader,
    /// File this was read from.
    pub path: PathBuf,
    /// Number of complete data records in the file.
    pub n_records: usize,
    record_bytes: usize,
    offsets: Vec<usize>,
}

/// Open an EDF file and parse its header without reading samples.
pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<RawEdf> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let file_len = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len() as usize;
    let mut reader = BufReader::new(file);
    let header =
        read_header(&mut reader).with_context(|| format!("parse header of {}", path.display()))?;

    let record_bytes = header.record_bytes();
    if record_bytes == 0 {
        bail!("{}: data records are empty", path.display());
    }
    let available = file_len.saturating_sub(header.header_bytes) / record_bytes;
    let n_records = if header.n_records < 0 {
        available
    } else {
        let declared = header.n_records as usize;
        if declared > available {
            bail!(
                "{}: header declares {declared} data records but file holds {available}",
                path.display()
            );
        }
        declared
    };

    tracing::debug!(
        path = %path.display(),
        signals = header.signals.len(),
        n_records,
        record_duration = header.record_duration,
        start = %header.start,
        "opened EDF"
    );

    let offsets = header.signal_offsets();
    Ok(RawEdf { header, path: path.to_path_buf(), n_records, record_bytes, offsets })
}

impl RawEdf {
    /// Recording duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.n_records as f64 * self.header.record_duration
    }

    /// Sampling rate of signal `idx`.
    pub fn sfreq(&self, idx: usize) -> f64 {
        self.header.signals[idx].sfreq(self.header.record_duration)
    }

    /// Total samples of signal `idx`.
    pub fn n_times(&self, idx: usize) -> usize {
        self.header.signals[idx].samples_per_record * self.n_records
    }

    /// Resolve channel names to signal indices.
    ///
    /// Matching ignores case and spaces, so `"eeg fpz-cz"` finds
    /// `"EEG Fpz-Cz"`. Unknown names are an error.
    pub fn pick(&self, names: &[String]) -> Result<Vec<usize>> {
        let norm = |s: &str| s.replace(' ', "").to_lowercase();
        names
            .iter()
            .map(|name| {
                self.header
                    .signals
                    .iter()
                    .position(|s| norm(&s.label) == norm(name))
                    .with_context(|| {
                        let available: Vec<&str> =
                            self.header.signals.iter().map(|s| s.label.as_str()).collect();
                        format!(
                            "{}: channel {name:?} not found (have {available:?})",
                            self.path.display()
                        )
                    })
            })
            .collect()
    }

    /// Read every sample of the picked channels.
    pub fn read_all(&self, picks: &[usize]) -> Result<RawSignal> {
        let n_t = self.common_spr(picks)? * self.n_records;
        self.read_slice(picks, 0, n_t)
    }

    /// Read the half-open sample range `[start, end)` of the picked channels.
    ///
    /// Only the data records overlapping the range are decoded, which keeps
    /// memory bounded to the requested span.
    pub fn read_slice(&self, picks: &[usize], start: usize, end: usize) -> Result<RawSignal> {
        let spr = self.common_spr(picks)?;
        let n_total = spr * self.n_records;
        if start > end || end > n_total {
            bail!(
                "{}: sample range [{start}, {end}) outside recording of {n_total} samples",
                self.path.display()
            );
        }

        let mut out = Array2::<f64>::zeros((picks.len(), end - start));
        if end > start {
            let file = File::open(&self.path)
                .with_context(|| format!("open {}", self.path.display()))?;
            let mut reader = BufReader::new(file);
            let first_rec = start / spr;
            let last_rec = (end - 1) / spr;
            let mut record = vec![0u8; self.record_bytes];

            for r in first_rec..=last_rec {
                self.read_record(&mut reader, r, &mut record)?;
                let rec_base = r * spr;
                let lo = start.max(rec_base) - rec_base;
                let hi = end.min(rec_base + spr) - rec_base;
                for (row, &sig) in picks.iter().enumerate() {
                    let hdr = &self.header.signals[sig];
                    let block = &record[self.offsets[sig]..self.offsets[sig] + spr * 2];
                    for t in lo..hi {
                        let digital = i16::from_le_bytes([block[2 * t], block[2 * t + 1]]);
                        out[[row, rec_base + t - start]] = hdr.to_physical(digital);
                    }
                }
            }
        }

        Ok(RawSignal {
            data: out,
            sfreq: self.sfreq(picks[0]),
            start: self.header.start,
            ch_names: picks.iter().map(|&i| self.header.signals[i].label.clone()).collect(),
            first_sample: start,
        })
    }

    /// Raw bytes of signal `idx` in every data record, concatenated.
    ///
    /// Used for the annotation channel, whose "samples" are TAL text.
    pub fn read_signal_bytes(&self, idx: usize) -> Result<Vec<Vec<u8>>> {
        let file = File::open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = BufReader::new(file);
        let width = self.header.signals[idx].samples_per_record * 2;
        let mut record = vec![0u8; self.record_bytes];
        let mut out = Vec::with_capacity(self.n_records);
        for r in 0..self.n_records {
            self.read_record(&mut reader, r, &mut record)?;
            out.push(record[self.offsets[idx]..self.offsets[idx] + width].to_vec());
        }
        Ok(out)
    }

    fn read_record<R: Read + Seek>(&self, reader: &mut R, r: usize, buf: &mut [u8]) -> Result<()> {
        let pos = (self.header.header_bytes + r * self.record_bytes) as u64;
        reader
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek to data record {r} @ {pos:#x}"))?;
        reader
            .read_exact(buf)
            .with_context(|| format!("{}: read data record {r}", self.path.display()))?;
        Ok(())
    }

    /// Samples per record shared by all picks; mixed rates are an error.
    fn common_spr(&self, picks: &[usize]) -> Result<usize> {
        let Some(&first) = picks.first() else {
            bail!("no channels picked");
        };
        let signals: Vec<&SignalHeader> = picks.iter().map(|&i| &self.header.signals[i]).collect();
        if let Some(s) = signals.iter().find(|s| s.is_annotation()) {
            bail!("{}: {:?} is not a data channel", self.path.display(), s.label);
        }
        let spr = self.header.signals[first].samples_per_record;
        if let Some(s) = signals.iter().find(|s| s.samples_per_record != spr) {
            bail!(
                "{}: channel {:?} samples at {} Hz, {:?} at {} Hz",
                self.path.display(),
                s.label,
                s.sfreq(self.header.record_duration),
                signals[0].label,
                signals[0].sfreq(self.header.record_duration),
            );
        }
        Ok(spr)
    }
}
