//! Classifier training and evaluation.
//!
//! ```text
//! train FeatureTable
//!   ├─ split::split_subjects()       subject-disjoint hold-out
//!   ├─ forest::RandomForest::fit()   bagged CART trees on the train side
//!   └─ metrics::classification_report()  on the validation side
//! ```
pub mod forest;
pub mod metrics;
pub mod split;

use anyhow::{bail, Result};
use serde::Serialize;

pub use forest::{ForestParams, RandomForest};
pub use metrics::{accuracy, classification_report, confusion_matrix, ClassificationReport};
pub use split::{split_subjects, SubjectSplit};

use crate::config::PipelineConfig;
use crate::labels::SleepStage;
use crate::table::FeatureTable;

/// Outcome of one hold-out evaluation, serialised as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub feature_names: Vec<String>,
    pub train_subjects: Vec<String>,
    pub val_subjects: Vec<String>,
    pub n_train_rows: usize,
    pub n_val_rows: usize,
    pub n_trees: usize,
    pub seed: u64,
    pub metrics: ClassificationReport,
}

/// Split `table` by subject, fit on the train side and score the
/// validation side. Returns the fitted forest with its report.
pub fn train_and_evaluate(
    table: &FeatureTable,
    cfg: &PipelineConfig,
) -> Result<(RandomForest, EvaluationReport)> {
    let split = split_subjects(&table.subjects(), cfg.val_fraction, cfg.seed)?;
    let (train, val) = split.apply(table);
    if train.is_empty() || val.is_empty() {
        bail!("subject split left an empty partition ({} / {} rows)", train.len(), val.len());
    }
    tracing::info!(
        train_rows = train.len(),
        val_rows = val.len(),
        val_subjects = split.val_subjects.len(),
        "split training table by subject"
    );

    let params = ForestParams::from(cfg);
    let forest = RandomForest::fit(&train.features(), &train.targets()?, &params)?;
    let pred = forest.predict(&val.features())?;
    let truth = val.targets()?;
    let metrics = classification_report(&truth.to_vec(), &pred.to_vec())?;
    tracing::info!(accuracy = metrics.accuracy, "validation");

    let report = EvaluationReport {
        feature_names: table.feature_names().to_vec(),
        train_subjects: split.train_subjects.into_iter().collect(),
        val_subjects: split.val_subjects.into_iter().collect(),
        n_train_rows: train.len(),
        n_val_rows: val.len(),
        n_trees: forest.n_trees(),
        seed: cfg.seed,
        metrics,
    };
    Ok((forest, report))
}

/// Predict a stage for every row of `table`, in row order.
pub fn predict_stages(forest: &RandomForest, table: &FeatureTable) -> Result<Vec<SleepStage>> {
    forest
        .predict(&table.features())?
        .iter()
        .map(|&id| SleepStage::from_id(id as u8))
        .collect()
}
