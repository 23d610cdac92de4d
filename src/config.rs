//! Hyper-parameters consumed by the data pipeline. These mirror the subset of the tacotron2 and
//! waveglow configs that influence data preparation, any training-only fields in a config file are
//! ignored when deserialising.
//!
//! Getting the STFT values wrong here won't cause an error anywhere, the model will just be
//! trained on spectrograms that don't match what it sees at inference. So keep them in one place
//! and share the same file between the corpus tooling and the model.
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HParams {
    /// Directory searched recursively for `*.zip` corpora
    pub data_dir: PathBuf,
    /// Value the raw samples are divided by, 32768 for 16-bit PCM
    pub max_wav_value: f32,
    /// Names of the cleaners applied to transcripts, in order
    pub text_cleaners: Vec<String>,
    /// FFT size
    pub filter_length: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub n_mel_channels: usize,
    pub sampling_rate: u32,
    pub mel_fmin: f32,
    /// Upper bound of the mel filterbank, `None` means the Nyquist frequency
    pub mel_fmax: Option<f32>,
    pub batch_size: usize,
    /// The decoder emits this many frames per step so padded targets must be a multiple of it
    pub n_frames_per_step: usize,
    pub train_val_ratios: [f64; 2],
    /// Length in samples of the waveform slices used for vocoder training
    pub segment_length: usize,
    pub num_workers: usize,
    /// Shortest utterance kept, in seconds (inclusive)
    pub min_duration: f64,
    /// Longest utterance kept, in seconds (exclusive)
    pub max_duration: f64,
}

impl Default for HParams {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_wav_value: 32768.0,
            text_cleaners: vec!["english_cleaners".to_string()],
            filter_length: 1024,
            hop_length: 256,
            win_length: 1024,
            n_mel_channels: 80,
            sampling_rate: 22050,
            mel_fmin: 0.0,
            mel_fmax: Some(8000.0),
            batch_size: 64,
            n_frames_per_step: 1,
            train_val_ratios: [0.95, 0.05],
            segment_length: 16000,
            num_workers: 1,
            min_duration: 1.5,
            max_duration: 11.61,
        }
    }
}

impl HParams {
    /// Loads hyper-parameters from a JSON file. Waveglow style configs nest the data parameters
    /// under a `data_config` key, if that's present it's used instead of the top level object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(data)?;
        if let Some(inner) = value.get_mut("data_config") {
            value = inner.take();
        }
        let params: Self = serde_json::from_value(value)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.filter_length == 0 || self.hop_length == 0 || self.win_length == 0 {
            return invalid("filter, hop and window lengths must be non-zero");
        }
        if self.win_length > self.filter_length {
            return invalid("win_length can't exceed filter_length");
        }
        if self.n_mel_channels == 0 {
            return invalid("n_mel_channels must be non-zero");
        }
        if self.sampling_rate == 0 {
            return invalid("sampling_rate must be non-zero");
        }
        if self.n_frames_per_step == 0 {
            return invalid("n_frames_per_step must be non-zero");
        }
        let mel_fmax = self.mel_fmax.unwrap_or(self.sampling_rate as f32 / 2.0);
        if !(self.mel_fmin >= 0.0 && self.mel_fmin < mel_fmax) {
            return invalid("mel_fmin must be non-negative and below mel_fmax (or nyquist)");
        }
        if self.max_wav_value <= 0.0 {
            return invalid("max_wav_value must be positive");
        }
        if self.min_duration >= self.max_duration {
            return invalid("min_duration must be below max_duration");
        }
        crate::corpus::validate_ratios(&self.train_val_ratios)?;
        Ok(())
    }
}
