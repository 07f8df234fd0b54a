//! # sleepstage: sleep staging from Sleep-EDF polysomnography
//!
//! `sleepstage` reads PSG recordings and hypnograms straight from EDF/EDF+
//! files, cuts them into labelled 30 s windows, computes relative band-power
//! features and trains a random forest to predict the sleep stage of every
//! window.
//!
//! ## Pipeline overview
//!
//! ```text
//! train_records.csv / test_records.csv
//!   │
//!   ├─ catalog::load_*_catalog()     record metadata, file paths
//!   ├─ edf::open_raw()               native EDF reader, channel pick
//!   ├─ edf::read_annotations()       hypnogram TALs (train only)
//!   ├─ epoch::align_train/test()     truncate → crop → chunk → 30 s windows
//!   ├─ epoch::epoch()                [E, C, 3000] samples
//!   ├─ spectrum::band_power_features()  Welch PSD → 5 relative band powers / channel
//!   └─ table::FeatureTable           row per window, keyed by (id, meas_time)
//!        │
//!        ├─ model::train_and_evaluate()   subject split · forest · report
//!        └─ submission::write_submission()   id, meas_time, condition
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use sleepstage::{build_train_table, load_train_catalog, model, PipelineConfig};
//!
//! let cfg = PipelineConfig::default();
//! let records = load_train_catalog(Path::new("train_records.csv"), Path::new("data")).unwrap();
//! let table = build_train_table(&records, &cfg).unwrap();
//!
//! let (_forest, report) = model::train_and_evaluate(&table, &cfg).unwrap();
//! println!("{}", report.metrics);
//! ```

pub mod catalog;
pub mod config;
pub mod edf;
pub mod epoch;
pub mod labels;
pub mod logging;
pub mod model;
pub mod spectrum;
pub mod submission;
pub mod table;

use anyhow::{bail, Context, Result};

// ── Crate-root re-exports ─────────────────────────────────────────────────

// catalog
pub use catalog::{
    load_test_catalog, load_train_catalog, sample_records, Record, SubmissionTemplate,
};

// config
pub use config::PipelineConfig;

// edf
pub use edf::{open_raw, read_annotations, AnnotationInterval, RawEdf, RawSignal};

// epoch
pub use epoch::{align_test, align_train, chunk_intervals, epoch, TimeRange, Window};

// labels
pub use labels::{remap, Label, SleepStage};

// spectrum
pub use spectrum::{band_power_features, feature_names, relative_band_power};

// table
pub use table::{FeatureRow, FeatureTable, Population};

// submission
pub use submission::{build_submission, write_submission, SubmissionRow};

/// Build the labelled feature table of one training record.
///
/// 1. Open the PSG and resolve [`PipelineConfig::channels`].
/// 2. Cut [`PipelineConfig::margin_secs`] from both ends.
/// 3. Read the hypnogram and shift it onto the PSG time axis.
/// 4. Align 30 s windows to the truncated range (the window count must
///    tile it exactly).
/// 5. Decode only the truncated range, epoch it and compute band powers.
///
/// Windows labelled `Movement time` or `Sleep stage ?` are dropped.
pub fn process_train_record(record: &Record, cfg: &PipelineConfig) -> Result<FeatureTable> {
    let raw = open_raw(&record.psg)?;
    let (picks, sfreq) = pick_channels(&raw, cfg)?;
    let range = epoch::truncation_range(raw.duration_secs(), cfg.margin_secs)
        .with_context(|| format!("record {}", record.id))?;

    let hypnogram = record
        .hypnogram
        .as_ref()
        .with_context(|| format!("record {} has no hypnogram", record.id))?;
    let intervals = read_annotations(hypnogram)?.relative_to(raw.header.start);
    let windows = align_train(&intervals, range, cfg.window_secs, sfreq)
        .with_context(|| format!("align record {}", record.id))?;

    let table = windows_to_table(record, &raw, &picks, sfreq, range, &windows, cfg, Population::Train)?;
    tracing::info!(
        record = %record.id,
        windows = windows.len(),
        kept = table.len(),
        "processed training record"
    );
    Ok(table)
}

/// Build the feature table of one test record.
///
/// The evaluated range runs from the first to one window past the last
/// template row of the record; labels are placeholders.
pub fn process_test_record(
    record: &Record,
    template: &SubmissionTemplate,
    cfg: &PipelineConfig,
) -> Result<FeatureTable> {
    let raw = open_raw(&record.psg)?;
    let (picks, sfreq) = pick_channels(&raw, cfg)?;
    let (first, last) = template.span(&record.id)?;
    let range = epoch::eval_range(raw.header.start, first, last, cfg.window_secs)
        .with_context(|| format!("record {}", record.id))?;
    let windows = align_test(range, cfg.window_secs, sfreq)
        .with_context(|| format!("align record {}", record.id))?;

    let table = windows_to_table(record, &raw, &picks, sfreq, range, &windows, cfg, Population::Test)?;
    tracing::info!(record = %record.id, windows = table.len(), "processed test record");
    Ok(table)
}

/// Training table over `records`, one record at a time.
///
/// With [`PipelineConfig::max_train_records`] set, a seeded random subset
/// of the catalog is used.
pub fn build_train_table(records: &[Record], cfg: &PipelineConfig) -> Result<FeatureTable> {
    let records = match cfg.max_train_records {
        Some(n) if n < records.len() => {
            tracing::info!(n, of = records.len(), "sampling training records");
            sample_records(records, n, cfg.seed)
        }
        _ => records.to_vec(),
    };
    let tables = records
        .iter()
        .map(|r| process_train_record(r, cfg))
        .collect::<Result<Vec<_>>>()?;
    FeatureTable::concat(tables)
}

/// Test table over `records`, one record at a time.
pub fn build_test_table(
    records: &[Record],
    template: &SubmissionTemplate,
    cfg: &PipelineConfig,
) -> Result<FeatureTable> {
    let tables = records
        .iter()
        .map(|r| process_test_record(r, template, cfg))
        .collect::<Result<Vec<_>>>()?;
    FeatureTable::concat(tables)
}

fn pick_channels(raw: &RawEdf, cfg: &PipelineConfig) -> Result<(Vec<usize>, f64)> {
    let picks = raw.pick(&cfg.channels)?;
    let Some(&first) = picks.first() else {
        bail!("no channels selected");
    };
    let sfreq = raw.sfreq(first);
    if !(sfreq.is_finite() && sfreq > 0.0) {
        bail!("{}: invalid sampling rate {sfreq} Hz", raw.path.display());
    }
    Ok((picks, sfreq))
}

#[allow(clippy::too_many_arguments)]
fn windows_to_table(
    record: &Record,
    raw: &RawEdf,
    picks: &[usize],
    sfreq: f64,
    range: TimeRange,
    windows: &[Window],
    cfg: &PipelineConfig,
    population: Population,
) -> Result<FeatureTable> {
    let (s0, s1) = range.samples(sfreq);
    let signal = raw.read_slice(picks, s0, s1)?;
    let epochs = epoch(&signal, windows, cfg.window_samples(sfreq))?;
    let features = band_power_features(&epochs, sfreq, cfg)?;
    tracing::debug!(record = %record.id, epochs = ?epochs.dim(), "extracted features");
    FeatureTable::assemble(
        record,
        raw.header.start,
        windows,
        &features,
        feature_names(&cfg.channels),
        population,
    )
}
