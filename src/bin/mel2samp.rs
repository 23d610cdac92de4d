//! Takes a list of clean WAV files and writes a mel spectrogram for each of them. Useful for
//! making vocoder test sets, this isn't used in the online training path.
use anyhow::Context;
use clap::Parser;
use ndarray_npy::write_npy;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tts_corpus::decode::decode_wav;
use tts_corpus::{HParams, TextMelExtractor};

#[derive(Parser, Debug)]
pub struct Args {
    /// Text file with one WAV path per line
    #[clap(short, long)]
    filelist_path: PathBuf,
    /// JSON file for configuration, waveglow style `data_config` sections are accepted
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Output directory, created if it doesn't exist
    #[clap(short, long)]
    output_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tts_corpus::setup_logging();
    let args = Args::parse();

    let hparams = match &args.config {
        Some(path) => HParams::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HParams::default(),
    };
    let extractor = TextMelExtractor::from_hparams(&hparams)?;

    let filelist = fs::read_to_string(&args.filelist_path)
        .with_context(|| format!("reading {}", args.filelist_path.display()))?;
    fs::create_dir_all(&args.output_dir)?;

    for line in filelist.lines().map(str::trim_end).filter(|x| !x.is_empty()) {
        let path = PathBuf::from(line);
        let name = path
            .file_name()
            .and_then(|x| x.to_str())
            .with_context(|| format!("invalid file name: {}", line))?
            .to_string();
        let waveform = decode_wav(&name, fs::read(&path)?)?;
        let mel = extractor
            .get_mel(&waveform)
            .with_context(|| format!("computing mel for {}", path.display()))?;
        let output = args.output_dir.join(format!("{}.npy", name));
        write_npy(&output, &mel)?;
        info!("{}", output.display());
    }
    Ok(())
}
