//! Subject-disjoint hold-out split.
//!
//! Windows from one subject are strongly correlated, so the validation set
//! is drawn by subject rather than by row: every window of a validation
//! subject is held out, and no subject contributes to both sides.
use std::collections::BTreeSet;

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::table::FeatureTable;

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSplit {
    pub train_subjects: BTreeSet<String>,
    pub val_subjects: BTreeSet<String>,
}

/// Shuffle `subjects` with `seed` and hold out `floor(n × val_fraction)` of
/// them (at least one) for validation.
pub fn split_subjects(
    subjects: &BTreeSet<String>,
    val_fraction: f64,
    seed: u64,
) -> Result<SubjectSplit> {
    if !(0.0..1.0).contains(&val_fraction) || val_fraction == 0.0 {
        bail!("validation fraction must be in (0, 1), got {val_fraction}");
    }
    let n = subjects.len();
    if n < 2 {
        bail!("need at least two subjects for a subject-disjoint split, have {n}");
    }
    let n_val = ((n as f64 * val_fraction).floor() as usize).clamp(1, n - 1);

    let mut order: Vec<&String> = subjects.iter().collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let val_subjects: BTreeSet<String> = order[..n_val].iter().map(|s| (*s).clone()).collect();
    let train_subjects: BTreeSet<String> = order[n_val..].iter().map(|s| (*s).clone()).collect();

    Ok(SubjectSplit { train_subjects, val_subjects })
}

impl SubjectSplit {
    /// Partition `table` into `(train, validation)` rows.
    pub fn apply(&self, table: &FeatureTable) -> (FeatureTable, FeatureTable) {
        (
            table.filter_subjects(&self.val_subjects, false),
            table.filter_subjects(&self.val_subjects, true),
        )
    }
}
