//! Signal processing for turning waveforms into the spectrograms the models train on.
pub mod mel;
pub mod stft;

pub use mel::{create_mel_filter_bank, TacotronStft};
pub use stft::Stft;
