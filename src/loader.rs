//! Feeds a [`Dataset`] to a training consumer in shuffled batches.
//!
//! Items in a batch are produced in parallel by a small pool of scoped threads, each taking a
//! contiguous chunk of the batch. The batch is only handed out once every item is back, and the
//! first error from any item fails the whole batch. The randomness an item needs is seeded per
//! item from the epoch's RNG before any work starts, so output doesn't depend on which worker ran
//! what.
use crate::collate::TextMelCollate;
use crate::config::HParams;
use crate::corpus::{load_corpus, split_train_val, DurationRange, Subset};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::extract::{SegmentDataset, SegmentExtractor, SpectrogramDataset, TextMelExtractor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::panic;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub num_workers: usize,
    pub shuffle: bool,
    /// Drop the last batch if it's smaller than `batch_size`
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_workers: 1,
            shuffle: true,
            drop_last: true,
        }
    }
}

pub struct DataLoader<D> {
    dataset: Arc<D>,
    config: LoaderConfig,
}

impl<D: Dataset> DataLoader<D> {
    pub fn new(dataset: Arc<D>, config: LoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch_size must be non-zero".to_string(),
            ));
        }
        Ok(Self { dataset, config })
    }

    pub fn dataset(&self) -> &Arc<D> {
        &self.dataset
    }

    /// Number of batches yielded per epoch
    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        if self.config.drop_last {
            len / self.config.batch_size
        } else {
            (len + self.config.batch_size - 1) / self.config.batch_size
        }
    }

    /// Starts an epoch. The index order and per-item seeds are all drawn from `rng` here.
    pub fn epoch<R: Rng + ?Sized>(&self, rng: &mut R) -> Epoch<'_, D> {
        let mut indices = (0..self.dataset.len()).collect::<Vec<_>>();
        if self.config.shuffle {
            indices.shuffle(rng);
        }
        indices.truncate(self.num_batches() * self.config.batch_size);
        let work = indices.into_iter().map(|i| (i, rng.gen())).collect();
        info!(
            "Starting epoch of {} batches over {} items",
            self.num_batches(),
            self.dataset.len()
        );
        Epoch {
            loader: self,
            work,
            position: 0,
        }
    }

    fn fetch(&self, work: &[(usize, u64)]) -> Result<Vec<D::Item>> {
        let get = |(index, seed): &(usize, u64)| {
            let mut rng = StdRng::seed_from_u64(*seed);
            self.dataset.get(*index, &mut rng)
        };
        if self.config.num_workers <= 1 || work.len() <= 1 {
            return work.iter().map(get).collect();
        }

        let chunk_size = (work.len() + self.config.num_workers - 1) / self.config.num_workers;
        let results = thread::scope(|scope| {
            let handles = work
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || chunk.iter().map(get).collect::<Vec<_>>()))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });
        results.into_iter().flatten().collect()
    }
}

/// One pass over the dataset, yields the items for each batch in order.
pub struct Epoch<'a, D> {
    loader: &'a DataLoader<D>,
    work: Vec<(usize, u64)>,
    position: usize,
}

impl<'a, D: Dataset> Iterator for Epoch<'a, D> {
    type Item = Result<Vec<D::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.work.len() {
            return None;
        }
        let end = (self.position + self.loader.config.batch_size).min(self.work.len());
        let work = &self.work[self.position..end];
        debug!("Fetching batch items {}..{}", self.position, end);
        self.position = end;
        Some(self.loader.fetch(work))
    }
}

/// Everything the text-to-mel training loop needs from the data side
pub struct TrainingData {
    pub train: DataLoader<Subset<SpectrogramDataset>>,
    pub validation: Subset<SpectrogramDataset>,
    pub collate: TextMelCollate,
}

/// Loads every archive under `hparams.data_dir`, filters by duration, splits into train and
/// validation and wraps the training set in a shuffling loader.
pub fn prepare_dataloaders<R: Rng + ?Sized>(hparams: &HParams, rng: &mut R) -> Result<TrainingData> {
    hparams.validate()?;
    let range = DurationRange::new(hparams.min_duration, hparams.max_duration);
    let corpus = load_corpus(&hparams.data_dir, &range)?;
    let dataset = Arc::new(SpectrogramDataset::new(
        corpus,
        TextMelExtractor::from_hparams(hparams)?,
    ));
    let (train, validation) = split_train_val(dataset, &hparams.train_val_ratios, rng)?;

    let config = LoaderConfig {
        batch_size: hparams.batch_size,
        num_workers: hparams.num_workers,
        shuffle: true,
        drop_last: true,
    };
    Ok(TrainingData {
        train: DataLoader::new(Arc::new(train), config)?,
        validation,
        collate: TextMelCollate::new(hparams.n_frames_per_step)?,
    })
}

/// The vocoder equivalent of [`prepare_dataloaders`], no split is done for the vocoder.
pub fn prepare_segment_dataset(hparams: &HParams) -> Result<SegmentDataset> {
    hparams.validate()?;
    let range = DurationRange::new(hparams.min_duration, hparams.max_duration);
    let corpus = load_corpus(&hparams.data_dir, &range)?;
    Ok(SegmentDataset::new(
        corpus,
        SegmentExtractor::from_hparams(hparams)?,
    ))
}
