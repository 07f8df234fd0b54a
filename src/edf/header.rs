//! EDF / EDF+ header parsing.
//!
//! The header is plain ASCII in fixed-width, space-padded fields:
//!
//! ```text
//! ┌─ main header (256 bytes) ──────────────────────────────────────────┐
//! │ version 8 │ patient 80 │ recording 80 │ startdate 8 │ starttime 8  │
//! │ header bytes 8 │ reserved 44 │ n records 8 │ record dur 8 │ ns 4   │
//! ├─ signal headers (ns × 256 bytes, field-major) ─────────────────────┤
//! │ label 16·ns │ transducer 80·ns │ phys dim 8·ns │ phys min 8·ns     │
//! │ phys max 8·ns │ dig min 8·ns │ dig max 8·ns │ prefilter 80·ns      │
//! │ samples per record 8·ns │ reserved 32·ns                           │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Field-major" means all 16-byte labels come first, then all 80-byte
//! transducer fields, and so on.
use std::io::Read;
use std::ops::Range;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Label of the pseudo-signal that carries EDF+ annotations.
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

const MAIN_HEADER_BYTES: usize = 256;
const SIGNAL_HEADER_BYTES: usize = 256;

// ── Signal header ─────────────────────────────────────────────────────────

/// Per-signal header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefiltering: String,
    pub samples_per_record: usize,
}

impl SignalHeader {
    /// `true` for the EDF+ annotation channel.
    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }

    /// Sampling rate in Hz for a given data-record duration.
    pub fn sfreq(&self, record_duration: f64) -> f64 {
        self.samples_per_record as f64 / record_duration
    }

    /// Physical units per digital step.
    pub fn gain(&self) -> f64 {
        (self.physical_max - self.physical_min) / (self.digital_max - self.digital_min) as f64
    }

    /// Physical value of digital zero.
    pub fn offset(&self) -> f64 {
        self.physical_max - self.gain() * self.digital_max as f64
    }

    /// Factor converting the physical dimension to SI volts.
    ///
    /// `uV`/`µV` → 1e-6, `mV` → 1e-3, anything else is left as is.
    pub fn unit_scale(&self) -> f64 {
        match self.physical_dimension.as_str() {
            "uV" | "µV" => 1e-6,
            "mV" => 1e-3,
            _ => 1.0,
        }
    }

    /// Convert one digital sample to volts (or the native unit).
    #[inline]
    pub fn to_physical(&self, digital: i16) -> f64 {
        (self.gain() * digital as f64 + self.offset()) * self.unit_scale()
    }
}

// ── File header ───────────────────────────────────────────────────────────

/// Parsed EDF header.
#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub version: String,
    pub patient: String,
    pub recording: String,
    /// Recording start (local clock, no time zone).
    pub start: NaiveDateTime,
    /// Size of the full header; data records start at this offset.
    pub header_bytes: usize,
    pub reserved: String,
    /// Number of data records, `-1` while a recording is still open.
    pub n_records: i64,
    /// Duration of one data record in seconds.
    pub record_duration: f64,
    pub signals: Vec<SignalHeader>,
}

impl EdfHeader {
    /// `true` when the reserved field marks the file as EDF+.
    pub fn is_edf_plus(&self) -> bool {
        self.reserved.starts_with("EDF+")
    }

    /// Bytes per data record (every sample is a little-endian `i16`).
    pub fn record_bytes(&self) -> usize {
        self.signals.iter().map(|s| s.samples_per_record * 2).sum()
    }

    /// Byte offset of each signal's block inside a data record.
    pub fn signal_offsets(&self) -> Vec<usize> {
        self.signals
            .iter()
            .scan(0usize, |acc, s| {
                let off = *acc;
                *acc += s.samples_per_record * 2;
                Some(off)
            })
            .collect()
    }
}

/// Read the main header and all signal headers from the start of `reader`.
pub fn read_header<R: Read>(reader: &mut R) -> Result<EdfHeader> {
    let mut main = [0u8; MAIN_HEADER_BYTES];
    reader.read_exact(&mut main).context("read EDF main header")?;

    let version = field(&main, 0..8);
    if version != "0" {
        bail!("not an EDF file (version field {version:?})");
    }
    let patient = field(&main, 8..88);
    let recording = field(&main, 88..168);
    let start = parse_start(&field(&main, 168..176), &field(&main, 176..184))?;
    let header_bytes: usize = parse_num(&field(&main, 184..192), "header bytes")?;
    let reserved = field(&main, 192..236);
    let n_records: i64 = parse_num(&field(&main, 236..244), "number of data records")?;
    let record_duration: f64 = parse_num(&field(&main, 244..252), "data record duration")?;
    let ns: usize = parse_num(&field(&main, 252..256), "number of signals")?;

    if ns == 0 {
        bail!("EDF header declares zero signals");
    }
    let expected = MAIN_HEADER_BYTES + ns * SIGNAL_HEADER_BYTES;
    if header_bytes != expected {
        bail!("header size {header_bytes} does not match {ns} signals (expected {expected})");
    }

    let mut sig = vec![0u8; ns * SIGNAL_HEADER_BYTES];
    reader.read_exact(&mut sig).context("read EDF signal headers")?;

    // Field-major layout: each column holds `ns` consecutive fixed-width values.
    let mut cursor = 0usize;
    let mut column = |width: usize| -> Vec<String> {
        let out = (0..ns)
            .map(|i| field(&sig, cursor + i * width..cursor + (i + 1) * width))
            .collect();
        cursor += width * ns;
        out
    };
    let labels = column(16);
    let transducers = column(80);
    let dims = column(8);
    let phys_min = column(8);
    let phys_max = column(8);
    let dig_min = column(8);
    let dig_max = column(8);
    let prefilters = column(80);
    let spr = column(8);
    let _reserved = column(32);

    let mut signals = Vec::with_capacity(ns);
    for i in 0..ns {
        let s = SignalHeader {
            label: labels[i].clone(),
            transducer: transducers[i].clone(),
            physical_dimension: dims[i].clone(),
            physical_min: parse_num(&phys_min[i], "physical minimum")?,
            physical_max: parse_num(&phys_max[i], "physical maximum")?,
            digital_min: parse_num(&dig_min[i], "digital minimum")?,
            digital_max: parse_num(&dig_max[i], "digital maximum")?,
            prefiltering: prefilters[i].clone(),
            samples_per_record: parse_num(&spr[i], "samples per record")?,
        };
        if s.digital_max <= s.digital_min {
            bail!("signal {:?}: digital max {} <= digital min {}", s.label, s.digital_max, s.digital_min);
        }
        signals.push(s);
    }

    Ok(EdfHeader {
        version,
        patient,
        recording,
        start,
        header_bytes,
        reserved,
        n_records,
        record_duration,
        signals,
    })
}

// ── Field helpers ─────────────────────────────────────────────────────────

/// Decode a Latin-1 header field and strip the space padding.
fn field(buf: &[u8], range: Range<usize>) -> String {
    buf[range]
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_num<T>(s: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.trim()
        .parse::<T>()
        .with_context(|| format!("invalid {what} {s:?} in EDF header"))
}

/// Parse `dd.mm.yy` + `hh.mm.ss`. Two-digit years 85–99 are 19xx, the rest 20xx.
fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime> {
    let d: Vec<u32> = split_triplet(date, "start date")?;
    let t: Vec<u32> = split_triplet(time, "start time")?;
    let year = (if d[2] >= 85 { 1900 + d[2] } else { 2000 + d[2] }) as i32;
    let day = NaiveDate::from_ymd_opt(year, d[1], d[0])
        .with_context(|| format!("invalid EDF start date {date:?}"))?;
    let clock = NaiveTime::from_hms_opt(t[0], t[1], t[2])
        .with_context(|| format!("invalid EDF start time {time:?}"))?;
    Ok(day.and_time(clock))
}

fn split_triplet(s: &str, what: &str) -> Result<Vec<u32>> {
    let parts = s
        .split('.')
        .map(|p| parse_num::<u32>(p, what))
        .collect::<Result<Vec<_>>>()?;
    if parts.len() != 3 {
        bail!("invalid {what} {s:?} in EDF header");
    }
    Ok(parts)
}
