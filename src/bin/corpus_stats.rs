use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tts_corpus::corpus::discover_archives;
use tts_corpus::stats::StatsGenerator;
use tts_corpus::{ArchiveDataset, DurationRange, HParams};

#[derive(Parser, Debug)]
pub struct Args {
    /// Directory searched for zip corpora, overrides the config
    #[clap(long)]
    data_dir: Option<PathBuf>,
    /// Hyper-parameter JSON, defaults are used if not provided
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Where to write the JSON report
    #[clap(short, long, default_value = "corpus_stats.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tts_corpus::setup_logging();
    let args = Args::parse();

    let mut hparams = match &args.config {
        Some(path) => HParams::load(path)?,
        None => HParams::default(),
    };
    if let Some(dir) = args.data_dir {
        hparams.data_dir = dir;
    }

    let range = DurationRange::new(hparams.min_duration, hparams.max_duration);
    let mut stats = StatsGenerator::new(range);
    for path in discover_archives(&hparams.data_dir)? {
        let dataset = ArchiveDataset::open(&path)?;
        stats.push_archive(&dataset);
    }
    let report = stats.generate_report(&hparams.train_val_ratios)?;

    info!("Archives: {}", report.archives);
    info!(
        "Records: {} kept, {} too short, {} too long",
        report.kept, report.too_short, report.too_long
    );
    info!("Hours of audio kept: {:.2}", report.kept_hours);
    info!(
        "Split: {} train, {} validation",
        report.train_size, report.validation_size
    );

    let report = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.output, report)?;

    Ok(())
}
