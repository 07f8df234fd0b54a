//! Record catalogs and the submission template.
//!
//! ```text
//! train_records.csv   id, subject_id, night, sex, age, hypnogram, psg
//! test_records.csv    id, subject_id, night, sex, age, psg
//!                     (hypnogram_path / psg_path also accepted)
//! sample_submission   id, meas_time[, condition]
//! ```
//!
//! File names in the catalogs are resolved against the EDF directory.
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

/// Timestamp format of `meas_time` in the template and the output.
pub const MEAS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One subject-night.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub subject_id: String,
    pub night: String,
    pub sex: String,
    pub age: f64,
    pub psg: PathBuf,
    /// Hypnogram file; present for training records only.
    pub hypnogram: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    id: String,
    subject_id: String,
    night: String,
    sex: String,
    age: f64,
    #[serde(alias = "psg_path")]
    psg: String,
    #[serde(default, alias = "hypnogram_path")]
    hypnogram: Option<String>,
}

/// Load a training catalog; every row must name a hypnogram.
pub fn load_train_catalog(path: &Path, edf_dir: &Path) -> Result<Vec<Record>> {
    let records = load_catalog(path, edf_dir)?;
    if let Some(r) = records.iter().find(|r| r.hypnogram.is_none()) {
        bail!("{}: training record {:?} has no hypnogram", path.display(), r.id);
    }
    Ok(records)
}

/// Load a test catalog. Hypnogram columns, if any, are ignored.
pub fn load_test_catalog(path: &Path, edf_dir: &Path) -> Result<Vec<Record>> {
    let records = load_catalog(path, edf_dir)?;
    Ok(records.into_iter().map(|r| Record { hypnogram: None, ..r }).collect())
}

fn load_catalog(path: &Path, edf_dir: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open catalog {}", path.display()))?;
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<RecordRow>().enumerate() {
        let row = row.with_context(|| format!("{}: malformed row {}", path.display(), i + 1))?;
        if !seen.insert(row.id.clone()) {
            bail!("{}: duplicate record id {:?}", path.display(), row.id);
        }
        records.push(Record {
            id: row.id,
            subject_id: row.subject_id,
            night: row.night,
            sex: row.sex,
            age: row.age,
            psg: edf_dir.join(row.psg),
            hypnogram: row.hypnogram.filter(|h| !h.is_empty()).map(|h| edf_dir.join(h)),
        });
    }
    tracing::info!(path = %path.display(), n = records.len(), "loaded catalog");
    Ok(records)
}

/// Draw at most `n` records at random, keeping catalog order.
pub fn sample_records(records: &[Record], n: usize, seed: u64) -> Vec<Record> {
    if n >= records.len() {
        return records.to_vec();
    }
    let mut idx: Vec<usize> = (0..records.len()).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    idx.truncate(n);
    idx.sort_unstable();
    idx.into_iter().map(|i| records[i].clone()).collect()
}

// ── Submission template ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TemplateRow {
    id: String,
    meas_time: String,
}

/// Evaluation windows expected in the output, in file order.
#[derive(Debug, Clone, Default)]
pub struct SubmissionTemplate {
    pub rows: Vec<(String, NaiveDateTime)>,
    spans: BTreeMap<String, (NaiveDateTime, NaiveDateTime)>,
}

impl SubmissionTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open submission template {}", path.display()))?;
        let mut rows = Vec::new();
        for (i, row) in reader.deserialize::<TemplateRow>().enumerate() {
            let row = row.with_context(|| format!("{}: malformed row {}", path.display(), i + 1))?;
            let t = parse_meas_time(&row.meas_time)
                .with_context(|| format!("{}: row {}", path.display(), i + 1))?;
            rows.push((row.id, t));
        }
        tracing::info!(path = %path.display(), n = rows.len(), "loaded submission template");
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: Vec<(String, NaiveDateTime)>) -> Self {
        let mut spans: BTreeMap<String, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
        for (id, t) in &rows {
            spans
                .entry(id.clone())
                .and_modify(|(lo, hi)| {
                    *lo = (*lo).min(*t);
                    *hi = (*hi).max(*t);
                })
                .or_insert((*t, *t));
        }
        Self { rows, spans }
    }

    /// First and last window start listed for record `id`.
    pub fn span(&self, id: &str) -> Result<(NaiveDateTime, NaiveDateTime)> {
        self.spans
            .get(id)
            .copied()
            .with_context(|| format!("record {id:?} has no rows in the submission template"))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a `meas_time` value (`YYYY-MM-DD HH:MM:SS`, `T` separator and
/// fractional seconds accepted).
pub fn parse_meas_time(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    [MEAS_TIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .with_context(|| format!("invalid meas_time {s:?}"))
}

pub fn format_meas_time(t: NaiveDateTime) -> String {
    t.format(MEAS_TIME_FORMAT).to_string()
}
