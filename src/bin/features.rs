//! Dump the per-window feature table of one catalog.
//!
//! ```sh
//! features --records train_records.csv --edf-dir data --output train_features.csv
//! features --records test_records.csv --template sample_submission.csv --output test_features.csv
//! ```
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use sleepstage::{
    build_test_table, build_train_table, load_test_catalog, load_train_catalog, logging,
    PipelineConfig, SubmissionTemplate,
};
use sleepstage::config::BandAggregate;

#[derive(Parser)]
#[command(name = "features", about = "Per-window band-power feature table")]
struct Args {
    /// Record catalog CSV
    #[arg(long)]
    records: PathBuf,

    /// Submission template; switches to test mode (placeholder labels,
    /// ranges taken from the template)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Directory the catalog file names are relative to
    #[arg(long, default_value = ".")]
    edf_dir: PathBuf,

    /// Feature table output path
    #[arg(long)]
    output: PathBuf,

    /// Channels to use (comma-separated EDF labels)
    #[arg(long, default_value = "EEG Fpz-Cz")]
    channels: String,

    /// Hours cut from both ends of each training recording
    #[arg(long, default_value_t = 5.0)]
    margin_hours: f64,

    /// Welch segment length in samples
    #[arg(long, default_value_t = 256)]
    n_fft: usize,

    /// Band reduction: mass (bands sum to 1) or mean
    #[arg(long, value_enum, default_value_t = BandAggregate::Mass)]
    band_aggregate: BandAggregate,

    /// Use at most this many randomly drawn records (train mode)
    #[arg(long)]
    max_records: Option<usize>,

    /// Random seed for record sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    logging::init()?;
    let args = Args::parse();

    let cfg = PipelineConfig {
        channels: args.channels.split(',').map(|s| s.trim().to_string()).collect(),
        margin_secs: args.margin_hours * 3600.0,
        n_fft: args.n_fft,
        band_aggregate: args.band_aggregate,
        max_train_records: args.max_records,
        seed: args.seed,
        ..PipelineConfig::default()
    };

    let table = match &args.template {
        Some(template) => {
            let template = SubmissionTemplate::load(template)?;
            let records = load_test_catalog(&args.records, &args.edf_dir)?;
            build_test_table(&records, &template, &cfg)?
        }
        None => {
            let records = load_train_catalog(&args.records, &args.edf_dir)?;
            build_train_table(&records, &cfg)?
        }
    };

    table.write_csv(&args.output)?;
    println!(
        "{} windows × {} features → {}",
        table.len(),
        table.feature_names().len(),
        args.output.display()
    );
    Ok(())
}
