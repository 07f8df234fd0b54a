use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sleepstage::{
    build_submission, build_test_table, build_train_table, load_test_catalog, load_train_catalog,
    logging, model, write_submission, PipelineConfig, SubmissionTemplate,
};
use sleepstage::config::{BandAggregate, FeatureSubset};

#[derive(Parser)]
#[command(name = "sleepstage", about = "Sleep staging: EDF → band powers → random forest → submission")]
struct Args {
    /// Training catalog CSV (id, subject_id, night, sex, age, hypnogram, psg)
    #[arg(long)]
    train_records: PathBuf,

    /// Test catalog CSV (id, subject_id, night, sex, age, psg)
    #[arg(long)]
    test_records: PathBuf,

    /// Submission template CSV (id, meas_time)
    #[arg(long)]
    template: PathBuf,

    /// Directory the catalog file names are relative to
    #[arg(long, default_value = ".")]
    edf_dir: PathBuf,

    /// Submission output path
    #[arg(long, default_value = "submission.csv")]
    output: PathBuf,

    /// Channels to use (comma-separated EDF labels)
    #[arg(long, default_value = "EEG Fpz-Cz")]
    channels: String,

    /// Hours cut from both ends of each training recording
    #[arg(long, default_value_t = 5.0)]
    margin_hours: f64,

    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Maximum tree depth (0 for unlimited)
    #[arg(long, default_value_t = 20)]
    max_depth: usize,

    /// Minimum number of samples in a leaf
    #[arg(long, default_value_t = 1)]
    min_samples_leaf: usize,

    /// Features drawn per tree: all, sqrt or a count
    #[arg(long, default_value = "sqrt")]
    max_features: FeatureSubset,

    /// Band reduction: mass (bands sum to 1) or mean
    #[arg(long, value_enum, default_value_t = BandAggregate::Mass)]
    band_aggregate: BandAggregate,

    /// Fraction of training subjects held out for validation
    #[arg(long, default_value_t = 0.2)]
    val_fraction: f64,

    /// Random seed for sampling, split and forest
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Use at most this many randomly drawn training records
    #[arg(long)]
    max_train_records: Option<usize>,

    /// Write the evaluation report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the training feature table as CSV
    #[arg(long)]
    train_features: Option<PathBuf>,

    /// Write the test feature table as CSV
    #[arg(long)]
    test_features: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init()?;
    let args = Args::parse();

    let cfg = PipelineConfig {
        channels: args.channels.split(',').map(|s| s.trim().to_string()).collect(),
        margin_secs: args.margin_hours * 3600.0,
        n_trees: args.n_trees,
        max_depth: (args.max_depth > 0).then_some(args.max_depth),
        min_samples_leaf: args.min_samples_leaf,
        max_features: args.max_features,
        band_aggregate: args.band_aggregate,
        val_fraction: args.val_fraction,
        seed: args.seed,
        max_train_records: args.max_train_records,
        ..PipelineConfig::default()
    };

    // ── Train / validate ──────────────────────────────────────────────────
    let train_records = load_train_catalog(&args.train_records, &args.edf_dir)?;
    let train = build_train_table(&train_records, &cfg)?;
    println!("Training table: {} windows × {} features", train.len(), train.feature_names().len());
    if let Some(path) = &args.train_features {
        train.write_csv(path)?;
    }

    let (forest, report) = model::train_and_evaluate(&train, &cfg)?;
    println!("Accuracy score: {:.4}", report.metrics.accuracy);
    println!("{}", report.metrics);
    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    }

    // ── Predict ───────────────────────────────────────────────────────────
    let template = SubmissionTemplate::load(&args.template)?;
    let test_records = load_test_catalog(&args.test_records, &args.edf_dir)?;
    let test = build_test_table(&test_records, &template, &cfg)?;
    if let Some(path) = &args.test_features {
        test.write_csv(path)?;
    }

    let stages = model::predict_stages(&forest, &test)?;
    let rows = build_submission(&template, &test, &stages)?;
    write_submission(&args.output, &rows)?;
    println!("Written → {}", args.output.display());

    Ok(())
}
