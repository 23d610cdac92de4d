//! Aggregation of many archives into one corpus, and the train/validation split over it.
use crate::archive::ArchiveDataset;
use crate::dataset::{Dataset, DecodedItem, IndexedDataset};
use crate::error::{Error, Result};
use crate::manifest::AudioRecordMetadata;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_SPLIT_RATIOS: [f64; 2] = [0.95, 0.05];

/// Half-open range of utterance durations in seconds. Utterances outside it are either mostly
/// silence or so long they blow up the padding cost of every batch they land in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self {
            min: 1.5,
            max: 11.61,
        }
    }
}

impl DurationRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, duration: f64) -> bool {
        self.min <= duration && duration < self.max
    }
}

/// Several datasets concatenated behind one index space. Nothing can be added or removed once
/// it's built so an index always resolves to the same item.
#[derive(Debug, Clone)]
pub struct Corpus<D = ArchiveDataset> {
    datasets: Vec<D>,
    /// `cumulative_sizes[i]` is the total length of datasets `0..=i`
    cumulative_sizes: Vec<usize>,
}

impl<D: IndexedDataset> Corpus<D> {
    pub fn new(datasets: Vec<D>) -> Self {
        let cumulative_sizes = datasets
            .iter()
            .scan(0, |acc, d| {
                *acc += d.len();
                Some(*acc)
            })
            .collect();
        Self {
            datasets,
            cumulative_sizes,
        }
    }

    pub fn datasets(&self) -> &[D] {
        &self.datasets
    }

    /// Maps a corpus index to the dataset holding it and the index within that dataset.
    pub fn resolve(&self, index: usize) -> Result<(usize, usize)> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let dataset = self.cumulative_sizes.partition_point(|&end| end <= index);
        let start = match dataset {
            0 => 0,
            n => self.cumulative_sizes[n - 1],
        };
        Ok((dataset, index - start))
    }
}

impl<D: IndexedDataset> IndexedDataset for Corpus<D> {
    fn len(&self) -> usize {
        self.cumulative_sizes.last().copied().unwrap_or(0)
    }

    fn metadata(&self, index: usize) -> Result<&AudioRecordMetadata> {
        let (dataset, local) = self.resolve(index)?;
        self.datasets[dataset].metadata(local)
    }

    fn get(&self, index: usize) -> Result<DecodedItem> {
        let (dataset, local) = self.resolve(index)?;
        self.datasets[dataset].get(local)
    }
}

/// Finds every `.zip` file under `dir`, recursively. Sorted so the corpus order doesn't depend on
/// the filesystem.
pub fn discover_archives(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut found = vec![];
    let mut pending = vec![dir.as_ref().to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() && path.extension().map_or(false, |e| e == "zip") {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Opens every archive under `dir`, applies the duration filter to each and concatenates them.
pub fn load_corpus(dir: impl AsRef<Path>, range: &DurationRange) -> Result<Corpus> {
    let dir = dir.as_ref();
    let archives = discover_archives(dir)?;
    if archives.is_empty() {
        warn!("No zip archives found in {}", dir.display());
    }
    let mut datasets = Vec::with_capacity(archives.len());
    for path in &archives {
        info!("Creating dataset for {}", path.display());
        let mut dataset = ArchiveDataset::open(path)?;
        dataset.retain_duration(range);
        datasets.push(dataset);
    }
    let corpus = Corpus::new(datasets);
    info!(
        "Corpus of {} archives, {} items after filtering",
        archives.len(),
        corpus.len()
    );
    Ok(corpus)
}

pub(crate) fn validate_ratios(ratios: &[f64]) -> Result<()> {
    let valid = ratios.len() == 2
        && ratios.iter().all(|r| (0.0..=1.0).contains(r))
        && (ratios.iter().sum::<f64>() - 1.0).abs() < 1e-6;
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSplitRatios(ratios.to_vec()))
    }
}

/// Works out the `(train, validation)` sizes. The training size is rounded half to even and
/// validation gets whatever is left, so the two always add up to `total`.
pub fn split_sizes(total: usize, ratios: &[f64]) -> Result<(usize, usize)> {
    validate_ratios(ratios)?;
    let train = ((total as f64 * ratios[0]).round_ties_even() as usize).min(total);
    Ok((train, total - train))
}

/// Randomly permutes `0..total` and cuts it into train and validation indices.
pub fn split_indices<R: Rng + ?Sized>(
    total: usize,
    ratios: &[f64],
    rng: &mut R,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let (train_size, _) = split_sizes(total, ratios)?;
    let mut indices = (0..total).collect::<Vec<_>>();
    indices.shuffle(rng);
    let validation = indices.split_off(train_size);
    Ok((indices, validation))
}

/// Splits a dataset into train and validation views. No stratification is done, seed `rng` if
/// you need the split to be reproducible.
pub fn split_train_val<D: Dataset, R: Rng + ?Sized>(
    dataset: Arc<D>,
    ratios: &[f64],
    rng: &mut R,
) -> Result<(Subset<D>, Subset<D>)> {
    let total = dataset.len();
    info!("Total dataset size {}", total);
    let (train, validation) = split_indices(total, ratios, rng)?;
    info!(
        "Training dataset size {}, validation size {}",
        train.len(),
        validation.len()
    );
    Ok((
        Subset::new(dataset.clone(), train),
        Subset::new(dataset, validation),
    ))
}

/// A view of a dataset restricted to some of its indices.
#[derive(Debug)]
pub struct Subset<D> {
    dataset: Arc<D>,
    indices: Vec<usize>,
}

impl<D> Clone for Subset<D> {
    fn clone(&self) -> Self {
        Self {
            dataset: self.dataset.clone(),
            indices: self.indices.clone(),
        }
    }
}

impl<D: Dataset> Subset<D> {
    pub fn new(dataset: Arc<D>, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    /// Indices into the underlying dataset
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<D: Dataset> Dataset for Subset<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize, rng: &mut StdRng) -> Result<Self::Item> {
        let inner = *self.indices.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.indices.len(),
        })?;
        self.dataset.get(inner, rng)
    }
}
