//! Mel filterbank and the tacotron2 style log-mel spectrogram.
//!
//! The filterbank matches `librosa.filters.mel` with its defaults: Slaney's mel scale (linear
//! below 1kHz, logarithmic above) and Slaney area normalisation so each filter has roughly
//! constant energy.
use super::stft::Stft;
use crate::config::HParams;
use crate::error::{Error, Result};
use ndarray::Array2;

/// Floor applied before the log so silence doesn't go to negative infinity
const CLIP_VAL: f32 = 1e-5;

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
/// ln(6.4) / 27
const LOGSTEP: f32 = 0.068_751_74;

fn hz_to_mel(f: f32) -> f32 {
    if f < MIN_LOG_HZ {
        f / F_SP
    } else {
        MIN_LOG_MEL + (f / MIN_LOG_HZ).ln() / LOGSTEP
    }
}

fn mel_to_hz(m: f32) -> f32 {
    if m < MIN_LOG_MEL {
        m * F_SP
    } else {
        MIN_LOG_HZ * (LOGSTEP * (m - MIN_LOG_MEL)).exp()
    }
}

/// Creates the `[n_mels, n_fft / 2 + 1]` filterbank matrix
pub fn create_mel_filter_bank(
    sample_rate: f32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: Option<f32>,
) -> Array2<f32> {
    let fmax = fmax.unwrap_or(sample_rate / 2.0);
    let n_bins = n_fft / 2 + 1;
    let fft_freqs = (0..n_bins)
        .map(|k| k as f32 * sample_rate / n_fft as f32)
        .collect::<Vec<_>>();

    let min_mel = hz_to_mel(fmin);
    let max_mel = hz_to_mel(fmax);
    let mel_freqs = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f32 / (n_mels + 1) as f32))
        .collect::<Vec<_>>();

    let mut weights = Array2::zeros((n_mels, n_bins));
    for m in 0..n_mels {
        let (left, centre, right) = (mel_freqs[m], mel_freqs[m + 1], mel_freqs[m + 2]);
        let enorm = 2.0 / (right - left);
        for (k, f) in fft_freqs.iter().enumerate() {
            let lower = (f - left) / (centre - left);
            let upper = (right - f) / (right - centre);
            weights[[m, k]] = lower.min(upper).max(0.0) * enorm;
        }
    }
    weights
}

/// STFT parameters plus the mel projection, owned by the extractors and shared between the
/// text-to-mel and the vocoder paths so both produce identical spectrograms.
#[derive(Debug)]
pub struct TacotronStft {
    stft: Stft,
    mel_basis: Array2<f32>,
    sampling_rate: u32,
}

impl TacotronStft {
    pub fn new(
        filter_length: usize,
        hop_length: usize,
        win_length: usize,
        n_mel_channels: usize,
        sampling_rate: u32,
        mel_fmin: f32,
        mel_fmax: Option<f32>,
    ) -> Result<Self> {
        if n_mel_channels == 0 {
            return Err(Error::InvalidConfig(
                "n_mel_channels must be non-zero".to_string(),
            ));
        }
        let stft = Stft::new(filter_length, hop_length, win_length)?;
        let mel_basis = create_mel_filter_bank(
            sampling_rate as f32,
            filter_length,
            n_mel_channels,
            mel_fmin,
            mel_fmax,
        );
        Ok(Self {
            stft,
            mel_basis,
            sampling_rate,
        })
    }

    pub fn from_hparams(params: &HParams) -> Result<Self> {
        Self::new(
            params.filter_length,
            params.hop_length,
            params.win_length,
            params.n_mel_channels,
            params.sampling_rate,
            params.mel_fmin,
            params.mel_fmax,
        )
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn n_mel_channels(&self) -> usize {
        self.mel_basis.nrows()
    }

    pub fn stft(&self) -> &Stft {
        &self.stft
    }

    /// Computes the log-mel spectrogram `[n_mel_channels, n_frames]` of a signal that's already
    /// been normalised to roughly `[-1, 1]`.
    pub fn mel_spectrogram(&self, signal: &[f32]) -> Result<Array2<f32>> {
        let magnitudes = self.stft.magnitude(signal)?;
        let mel = self.mel_basis.dot(&magnitudes);
        Ok(mel.mapv_into(|x| x.max(CLIP_VAL).ln()))
    }
}
