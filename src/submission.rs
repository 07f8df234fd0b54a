//! Submission output: one predicted stage per template row.
//!
//! Predictions are joined to the template by `(id, meas_time)` and written
//! in template order as `id, meas_time, condition`, with conditions in the
//! display vocabulary `W, 1, 2, 3/4, R`.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::catalog::{format_meas_time, parse_meas_time, SubmissionTemplate};
use crate::labels::SleepStage;
use crate::table::FeatureTable;

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    pub id: String,
    pub meas_time: NaiveDateTime,
    pub condition: SleepStage,
}

#[derive(Serialize, Deserialize)]
struct CsvRow {
    id: String,
    meas_time: String,
    condition: String,
}

/// Match `stages` (one per row of `table`) to the template rows.
///
/// Every template row needs a prediction; predictions for windows the
/// template does not list are dropped.
pub fn build_submission(
    template: &SubmissionTemplate,
    table: &FeatureTable,
    stages: &[SleepStage],
) -> Result<Vec<SubmissionRow>> {
    if stages.len() != table.len() {
        bail!("{} predictions for {} test rows", stages.len(), table.len());
    }
    let by_key: HashMap<(&str, NaiveDateTime), SleepStage> = table
        .rows()
        .iter()
        .zip(stages)
        .map(|(r, &s)| ((r.record_id.as_str(), r.meas_time), s))
        .collect();

    let rows = template
        .rows
        .iter()
        .map(|(id, t)| {
            let condition = by_key.get(&(id.as_str(), *t)).copied().with_context(|| {
                format!("no prediction for record {id} @ {}", format_meas_time(*t))
            })?;
            Ok(SubmissionRow { id: id.clone(), meas_time: *t, condition })
        })
        .collect::<Result<Vec<_>>>()?;

    let unused = table.len().saturating_sub(rows.len());
    if unused > 0 {
        tracing::debug!(unused, "test windows not listed in the template");
    }
    Ok(rows)
}

pub fn write_submission(path: &Path, rows: &[SubmissionRow]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    for r in rows {
        w.serialize(CsvRow {
            id: r.id.clone(),
            meas_time: format_meas_time(r.meas_time),
            condition: r.condition.display().to_string(),
        })?;
    }
    w.flush()?;
    tracing::info!(path = %path.display(), n = rows.len(), "wrote submission");
    Ok(())
}

/// Read a submission file back.
pub fn read_submission(path: &Path) -> Result<Vec<SubmissionRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| {
            let row = row.with_context(|| format!("{}: malformed row {}", path.display(), i + 1))?;
            Ok(SubmissionRow {
                meas_time: parse_meas_time(&row.meas_time)?,
                condition: SleepStage::from_display(&row.condition)?,
                id: row.id,
            })
        })
        .collect()
}
