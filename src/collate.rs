//! Batching of per-item results into padded dense arrays.
use crate::error::{Error, Result};
use crate::extract::{MelSegment, TextMelPair};
use ndarray::{s, Array1, Array2, Array3, Axis};
use std::cmp::Reverse;

/// A padded text-to-mel batch. Rows are sorted by descending input length and every array shares
/// that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch, max_input_len]`
    pub text_padded: Array2<i64>,
    pub input_lengths: Array1<i64>,
    /// `[batch, n_mel_channels, max_target_len]`
    pub mel_padded: Array3<f32>,
    /// `[batch, max_target_len]`, 1 from the last real frame onwards
    pub gate_padded: Array2<f32>,
    pub output_lengths: Array1<i64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.input_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Zero-pads model inputs and targets based on the number of frames per step.
#[derive(Clone, Copy, Debug)]
pub struct TextMelCollate {
    n_frames_per_step: usize,
}

impl TextMelCollate {
    pub fn new(n_frames_per_step: usize) -> Result<Self> {
        if n_frames_per_step == 0 {
            return Err(Error::InvalidConfig(
                "n_frames_per_step must be non-zero".to_string(),
            ));
        }
        Ok(Self { n_frames_per_step })
    }

    pub fn n_frames_per_step(&self) -> usize {
        self.n_frames_per_step
    }

    pub fn collate(&self, batch: &[TextMelPair]) -> Result<Batch> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch);
        }
        // sort_by_key is stable so equal lengths keep their original order
        let mut order = (0..batch.len()).collect::<Vec<_>>();
        order.sort_by_key(|i| Reverse(batch[*i].tokens.len()));

        let max_input_len = batch[order[0]].tokens.len();
        let mut text_padded = Array2::zeros((batch.len(), max_input_len));
        let mut input_lengths = Array1::zeros(batch.len());
        for (row, i) in order.iter().enumerate() {
            let tokens = &batch[*i].tokens;
            text_padded
                .slice_mut(s![row, ..tokens.len()])
                .assign(&Array1::from(tokens.clone()));
            input_lengths[row] = tokens.len() as i64;
        }

        let num_mels = batch[0].mel.nrows();
        let mut max_target_len = batch.iter().map(|x| x.mel.ncols()).max().unwrap_or(0);
        let remainder = max_target_len % self.n_frames_per_step;
        if remainder != 0 {
            max_target_len += self.n_frames_per_step - remainder;
            debug_assert_eq!(max_target_len % self.n_frames_per_step, 0);
        }

        let mut mel_padded = Array3::zeros((batch.len(), num_mels, max_target_len));
        let mut gate_padded = Array2::zeros((batch.len(), max_target_len));
        let mut output_lengths = Array1::zeros(batch.len());
        for (row, i) in order.iter().enumerate() {
            let mel = &batch[*i].mel;
            if mel.nrows() != num_mels {
                return Err(Error::InvalidConfig(format!(
                    "mel channel mismatch in batch: {} and {}",
                    num_mels,
                    mel.nrows()
                )));
            }
            let frames = mel.ncols();
            mel_padded.slice_mut(s![row, .., ..frames]).assign(mel);
            gate_padded
                .slice_mut(s![row, frames.saturating_sub(1)..])
                .fill(1.0);
            output_lengths[row] = frames as i64;
        }

        Ok(Batch {
            text_padded,
            input_lengths,
            mel_padded,
            gate_padded,
            output_lengths,
        })
    }
}

/// Stacked vocoder segments
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBatch {
    /// `[batch, n_mel_channels, frames]`
    pub mel: Array3<f32>,
    /// `[batch, segment_length]`
    pub audio: Array2<f32>,
}

/// Segments all have the same length so there's no padding, they're just stacked.
pub fn collate_segments(batch: &[MelSegment]) -> Result<SegmentBatch> {
    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }
    let mels = batch.iter().map(|x| x.mel.view()).collect::<Vec<_>>();
    let audio = batch.iter().map(|x| x.audio.view()).collect::<Vec<_>>();
    let mel = ndarray::stack(Axis(0), &mels)
        .map_err(|e| Error::InvalidConfig(format!("segment mels differ in shape: {}", e)))?;
    let audio = ndarray::stack(Axis(0), &audio)
        .map_err(|e| Error::InvalidConfig(format!("segments differ in length: {}", e)))?;
    Ok(SegmentBatch { mel, audio })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(tokens: usize, frames: usize, fill: f32) -> TextMelPair {
        TextMelPair {
            tokens: (1..=tokens as i64).collect(),
            mel: Array2::from_elem((4, frames), fill),
        }
    }

    #[test]
    fn sorted_by_input_length() {
        let collate = TextMelCollate::new(1).unwrap();
        let batch = collate
            .collate(&[pair(5, 3, 1.0), pair(2, 3, 2.0), pair(8, 3, 3.0)])
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.text_padded.dim(), (3, 8));
        assert_eq!(batch.input_lengths.to_vec(), vec![8, 5, 2]);
        // Mels follow the same order
        assert_eq!(batch.mel_padded[[0, 0, 0]], 3.0);
        assert_eq!(batch.mel_padded[[1, 0, 0]], 1.0);
        assert_eq!(batch.mel_padded[[2, 0, 0]], 2.0);
        // Zero padded tokens
        assert_eq!(
            batch.text_padded.row(2).to_vec(),
            vec![1, 2, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn stable_for_equal_lengths() {
        let collate = TextMelCollate::new(1).unwrap();
        let batch = collate
            .collate(&[pair(4, 2, 1.0), pair(6, 2, 2.0), pair(4, 2, 3.0)])
            .unwrap();
        assert_eq!(batch.mel_padded[[0, 0, 0]], 2.0);
        assert_eq!(batch.mel_padded[[1, 0, 0]], 1.0);
        assert_eq!(batch.mel_padded[[2, 0, 0]], 3.0);
    }

    #[test]
    fn frames_rounded_to_step() {
        let collate = TextMelCollate::new(5).unwrap();
        let batch = collate.collate(&[pair(3, 10, 1.0), pair(3, 17, 1.0)]).unwrap();
        assert_eq!(batch.mel_padded.dim(), (2, 4, 20));
        assert_eq!(batch.gate_padded.dim(), (2, 20));
        assert_eq!(batch.output_lengths.to_vec(), vec![10, 17]);
        // Padding is zero
        assert!(batch
            .mel_padded
            .slice(s![0, .., 10..])
            .iter()
            .all(|x| *x == 0.0));

        // Already a multiple so left alone
        let batch = collate.collate(&[pair(3, 15, 1.0)]).unwrap();
        assert_eq!(batch.mel_padded.dim(), (1, 4, 15));
    }

    #[test]
    fn gate_marks_last_frame_onwards() {
        let collate = TextMelCollate::new(4).unwrap();
        let batch = collate.collate(&[pair(2, 6, 1.0), pair(1, 3, 1.0)]).unwrap();
        assert_eq!(batch.gate_padded.ncols(), 8);
        assert_eq!(
            batch.gate_padded.row(0).to_vec(),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(
            batch.gate_padded.row(1).to_vec(),
            vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn empty_batch_rejected() {
        let collate = TextMelCollate::new(1).unwrap();
        assert!(matches!(collate.collate(&[]), Err(Error::EmptyBatch)));
        assert!(matches!(collate_segments(&[]), Err(Error::EmptyBatch)));
        assert!(TextMelCollate::new(0).is_err());
    }

    #[test]
    fn segments_stack() {
        let segment = |v: f32| MelSegment {
            mel: Array2::from_elem((4, 5), v),
            audio: Array1::from_elem(16, v),
        };
        let batch = collate_segments(&[segment(1.0), segment(2.0)]).unwrap();
        assert_eq!(batch.mel.dim(), (2, 4, 5));
        assert_eq!(batch.audio.dim(), (2, 16));
        assert_eq!(batch.audio[[1, 0]], 2.0);
    }
}
