//! Error type shared by the whole data pipeline. Every variant is fatal for the load or iteration
//! that hit it, nothing in here is retried or skipped.
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The zip container couldn't be read or is missing a resource we rely on
    #[error("archive {}: {reason}", .path.display())]
    ArchiveFormat { path: PathBuf, reason: String },
    /// A manifest line wasn't a valid record. `line` is 1-based
    #[error("{} manifest line {line}: {reason}", .path.display())]
    RecordParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("file extension for {0} was not recognized")]
    UnsupportedFormat(String),
    /// Payload had a known extension but the codec rejected the bytes
    #[error("failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("sample rate ({actual}) doesn't match target sample rate ({expected})")]
    SampleRateMismatch { actual: u32, expected: u32 },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot collate an empty batch")]
    EmptyBatch,
    #[error("invalid train/validation ratios {0:?}, expected two values summing to 1")]
    InvalidSplitRatios(Vec<f64>),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("cannot compute a spectrogram of an empty waveform")]
    EmptyWaveform,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArchiveFormat {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
