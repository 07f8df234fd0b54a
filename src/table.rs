//! Row-per-window feature tables.
//!
//! A [`FeatureTable`] pairs named feature columns with rows keyed by
//! `(record id, meas_time)`. Tables are values: filtering, concatenation and
//! partitioning return new tables and never reorder columns.
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDateTime};
use ndarray::{Array1, Array2};

use crate::catalog::{format_meas_time, Record};
use crate::epoch::Window;
use crate::labels::Label;

/// Which population a table is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    /// Labelled windows; excluded labels are dropped.
    Train,
    /// Placeholder labels; every window is kept.
    Test,
}

/// One window's metadata and features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub record_id: String,
    pub subject_id: String,
    /// Wall-clock start of the window.
    pub meas_time: NaiveDateTime,
    pub label: Label,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    feature_names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(feature_names: Vec<String>, rows: Vec<FeatureRow>) -> Result<Self> {
        if let Some(r) = rows.iter().find(|r| r.features.len() != feature_names.len()) {
            bail!(
                "row {} @ {} has {} features, table has {} columns",
                r.record_id,
                r.meas_time,
                r.features.len(),
                feature_names.len()
            );
        }
        Ok(Self { feature_names, rows })
    }

    /// Join one record's windows with their feature rows.
    ///
    /// `features` is `[E, F]` with `E == windows.len()` and `F ==
    /// names.len()`. Training tables drop windows with excluded labels.
    pub fn assemble(
        record: &Record,
        recording_start: NaiveDateTime,
        windows: &[Window],
        features: &Array2<f64>,
        names: Vec<String>,
        population: Population,
    ) -> Result<Self> {
        if features.nrows() != windows.len() {
            bail!(
                "record {}: {} feature rows for {} windows",
                record.id,
                features.nrows(),
                windows.len()
            );
        }
        let rows = windows
            .iter()
            .zip(features.rows())
            .filter(|(w, _)| population == Population::Test || !w.label.is_excluded())
            .map(|(w, f)| FeatureRow {
                record_id: record.id.clone(),
                subject_id: record.subject_id.clone(),
                meas_time: recording_start + Duration::milliseconds((w.onset * 1000.0).round() as i64),
                label: w.label,
                features: f.to_vec(),
            })
            .collect();
        Self::new(names, rows)
    }

    /// Concatenate per-record tables. Columns must agree and
    /// `(record id, meas_time)` must stay unique.
    pub fn concat(tables: Vec<FeatureTable>) -> Result<Self> {
        let mut iter = tables.into_iter();
        let Some(mut out) = iter.next() else {
            return Ok(Self::default());
        };
        let mut keys: HashSet<(String, NaiveDateTime)> =
            out.rows.iter().map(|r| (r.record_id.clone(), r.meas_time)).collect();
        for t in iter {
            if t.feature_names != out.feature_names {
                bail!("cannot concatenate tables with different feature columns");
            }
            for r in t.rows {
                if !keys.insert((r.record_id.clone(), r.meas_time)) {
                    bail!("duplicate row for record {} @ {}", r.record_id, r.meas_time);
                }
                out.rows.push(r);
            }
        }
        Ok(out)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose subject is (or, with `keep = false`, is not) in `subjects`.
    pub fn filter_subjects(&self, subjects: &BTreeSet<String>, keep: bool) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| subjects.contains(&r.subject_id) == keep)
                .cloned()
                .collect(),
        }
    }

    /// Distinct subject ids, sorted.
    pub fn subjects(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| r.subject_id.clone()).collect()
    }

    /// Feature matrix `[N, F]`.
    pub fn features(&self) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.rows.len(), self.feature_names.len()));
        for (mut dst, r) in out.rows_mut().into_iter().zip(&self.rows) {
            dst.assign(&ndarray::ArrayView1::from(&r.features));
        }
        out
    }

    /// One feature column by name.
    pub fn column(&self, name: &str) -> Result<Array1<f64>> {
        let idx = self
            .feature_names
            .iter()
            .position(|n| n == name)
            .with_context(|| format!("no feature column {name:?}"))?;
        Ok(self.rows.iter().map(|r| r.features[idx]).collect())
    }

    /// Stage ids as classifier targets. Excluded rows are an error.
    pub fn targets(&self) -> Result<Array1<usize>> {
        self.rows
            .iter()
            .map(|r| match r.label.stage() {
                Some(s) => Ok(s.id() as usize),
                None => bail!("row {} @ {} has an excluded label", r.record_id, r.meas_time),
            })
            .collect()
    }

    /// Write `id, subject_id, meas_time, condition, <features…>` as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut w = csv::Writer::from_path(path)
            .with_context(|| format!("create {}", path.display()))?;
        let mut header = vec!["id", "subject_id", "meas_time", "condition"];
        header.extend(self.feature_names.iter().map(String::as_str));
        w.write_record(&header)?;
        for r in &self.rows {
            let mut rec = vec![
                r.record_id.clone(),
                r.subject_id.clone(),
                format_meas_time(r.meas_time),
                r.label.id().to_string(),
            ];
            rec.extend(r.features.iter().map(|v| v.to_string()));
            w.write_record(&rec)?;
        }
        w.flush()?;
        Ok(())
    }
}
