//! Training data preparation for a text-to-mel model and its vocoder. Corpora are zip archives
//! holding a JSON-lines manifest and the audio, this crate reads them, filters them, and turns
//! each utterance into the padded arrays a training loop consumes.
//!
//! There's no training code here, the output is plain `ndarray` arrays.
use std::env;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{Layer, Registry};

pub mod archive;
pub mod audio;
pub mod collate;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod decode;
pub mod error;
pub mod extract;
pub mod loader;
pub mod manifest;
pub mod stats;
pub mod text;

#[cfg(test)]
pub(crate) mod test_utils;

pub use archive::ArchiveDataset;
pub use collate::{Batch, TextMelCollate};
pub use config::HParams;
pub use corpus::{load_corpus, split_train_val, Corpus, DurationRange};
pub use dataset::{Dataset, IndexedDataset};
pub use error::{Error, Result};
pub use extract::{SegmentDataset, SegmentExtractor, SpectrogramDataset, TextMelExtractor};
pub use loader::{DataLoader, LoaderConfig};

pub fn setup_logging() {
    let filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_env("RUST_LOG"),
        _ => EnvFilter::new("tts_corpus=info,mel2samp=info,corpus_stats=info"),
    };

    let fmt = tracing_subscriber::fmt::Layer::default();

    let subscriber = filter.and_then(fmt).with_subscriber(Registry::default());

    tracing::subscriber::set_global_default(subscriber).unwrap();
}
