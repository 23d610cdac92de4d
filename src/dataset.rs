//! The two capabilities a dataset can have. Anything backed by archives is an [`IndexedDataset`]
//! giving access to metadata and decoded audio, these can be aggregated into a
//! [`Corpus`](crate::corpus::Corpus). Anything producing training items (spectrograms, segments)
//! is a [`Dataset`] and can be fed to the [`DataLoader`](crate::loader::DataLoader).
use crate::decode::Waveform;
use crate::error::Result;
use crate::manifest::AudioRecordMetadata;
use rand::rngs::StdRng;

/// Decoded audio along with its transcript
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedItem {
    pub waveform: Waveform,
    pub text: String,
}

/// Random access to utterances and their metadata. Access only takes `&self` and implementors hold
/// no open file handles, so workers can share one instance and read disjoint indices.
pub trait IndexedDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn metadata(&self, index: usize) -> Result<&AudioRecordMetadata>;

    /// Decodes the audio for the item at `index`. This does the I/O, nothing is cached.
    fn get(&self, index: usize) -> Result<DecodedItem>;
}

/// A source of training items.
pub trait Dataset: Send + Sync {
    type Item: Send;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces the item at `index`. Any randomness (segment offsets) is drawn from `rng` so the
    /// caller controls reproducibility.
    fn get(&self, index: usize, rng: &mut StdRng) -> Result<Self::Item>;
}
