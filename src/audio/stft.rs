//! Magnitude short-time Fourier transform.
//!
//! The framing convention is fixed and has to match whatever the model sees at inference:
//!
//! * The signal is reflect-padded by `filter_length / 2` samples on each side so frame `t` is
//!   centred on sample `t * hop_length`. The reflection excludes the edge sample
//!   (`[a b c]` pads to `[c b | a b c | b a]`). Signals shorter than the padding are folded
//!   back and forth until the padding is filled.
//! * A periodic Hann window of `win_length` samples is zero-padded on both sides to
//!   `filter_length`.
//! * `n_frames = 1 + (len + 2 * (filter_length / 2) - filter_length) / hop_length`, which for an
//!   even `filter_length` is `1 + len / hop_length`.
use crate::error::{Error, Result};
use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

pub struct Stft {
    filter_length: usize,
    hop_length: usize,
    win_length: usize,
    /// Hann window already centred in a `filter_length` buffer
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Stft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stft")
            .field("filter_length", &self.filter_length)
            .field("hop_length", &self.hop_length)
            .field("win_length", &self.win_length)
            .finish()
    }
}

impl Stft {
    pub fn new(filter_length: usize, hop_length: usize, win_length: usize) -> Result<Self> {
        if filter_length == 0 || hop_length == 0 || win_length == 0 {
            return Err(Error::InvalidConfig(
                "STFT lengths must be non-zero".to_string(),
            ));
        }
        if win_length > filter_length {
            return Err(Error::InvalidConfig(format!(
                "win_length {} exceeds filter_length {}",
                win_length, filter_length
            )));
        }
        let mut window = vec![0.0; filter_length];
        let offset = (filter_length - win_length) / 2;
        window[offset..offset + win_length].copy_from_slice(&hann_window(win_length));

        let fft = FftPlanner::new().plan_fft_forward(filter_length);
        Ok(Self {
            filter_length,
            hop_length,
            win_length,
            window,
            fft,
        })
    }

    pub fn filter_length(&self) -> usize {
        self.filter_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn win_length(&self) -> usize {
        self.win_length
    }

    /// Number of frequency bins in each frame
    pub fn n_bins(&self) -> usize {
        self.filter_length / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn n_frames(&self, len: usize) -> usize {
        let pad = self.filter_length / 2;
        1 + (len + 2 * pad - self.filter_length) / self.hop_length
    }

    /// Returns the magnitude spectrogram with shape `[n_bins, n_frames]`
    pub fn magnitude(&self, signal: &[f32]) -> Result<Array2<f32>> {
        if signal.is_empty() {
            return Err(Error::EmptyWaveform);
        }
        let padded = reflect_pad(signal, self.filter_length / 2);
        let n_frames = self.n_frames(signal.len());
        let n_bins = self.n_bins();

        let mut result = Array2::zeros((n_bins, n_frames));
        let mut buffer = vec![Complex::new(0.0, 0.0); self.filter_length];
        for t in 0..n_frames {
            let start = t * self.hop_length;
            let frame = &padded[start..start + self.filter_length];
            for ((b, x), w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *b = Complex::new(x * w, 0.0);
            }
            self.fft.process(&mut buffer);
            for (k, c) in buffer.iter().take(n_bins).enumerate() {
                result[[k, t]] = c.norm();
            }
        }
        Ok(result)
    }
}

/// Periodic Hann window, the same as `scipy.signal.get_window("hann", n)`
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Maps a possibly out of bounds index back into `0..len` by reflection about the end samples.
fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m >= len as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let len = signal.len();
    let pad = pad as isize;
    (-pad..len as isize + pad)
        .map(|i| signal[reflect_index(i, len)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection() {
        let signal = [1.0, 2.0, 3.0];
        assert_eq!(
            reflect_pad(&signal, 2),
            vec![3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]
        );
        // Longer than the signal so it folds back again
        assert_eq!(
            reflect_pad(&signal, 4),
            vec![1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0]
        );
        assert_eq!(reflect_pad(&[5.0], 2), vec![5.0; 5]);
    }

    #[test]
    fn frame_count() {
        let stft = Stft::new(1024, 256, 1024).unwrap();
        for len in [1, 255, 256, 257, 1024, 22050, 44100] {
            let expected = 1 + len / 256;
            assert_eq!(stft.n_frames(len), expected);
            let mag = stft.magnitude(&vec![0.1; len]).unwrap();
            assert_eq!(mag.dim(), (513, expected));
        }
    }

    #[test]
    fn window_is_centred() {
        let stft = Stft::new(16, 4, 8).unwrap();
        assert!(stft.window[..4].iter().all(|x| *x == 0.0));
        assert!(stft.window[12..].iter().all(|x| *x == 0.0));
        // Periodic hann peaks in the middle
        assert!((stft.window[8] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sine_peaks_in_right_bin() {
        let sr = 16000.0;
        let n_fft = 512;
        // Exactly on bin 32
        let freq = 32.0 * sr / n_fft as f32;
        let signal = (0..8000)
            .map(|i| (2.0 * PI * freq * i as f32 / sr).sin())
            .collect::<Vec<_>>();
        let stft = Stft::new(n_fft, 128, n_fft).unwrap();
        let mag = stft.magnitude(&signal).unwrap();
        let frame = mag.column(20);
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32);
    }

    #[test]
    fn invalid_parameters() {
        assert!(Stft::new(512, 0, 512).is_err());
        assert!(Stft::new(512, 128, 1024).is_err());
        let stft = Stft::new(512, 128, 512).unwrap();
        assert!(matches!(stft.magnitude(&[]), Err(Error::EmptyWaveform)));
    }
}
