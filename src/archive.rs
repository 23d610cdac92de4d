use crate::corpus::DurationRange;
use crate::dataset::{DecodedItem, IndexedDataset};
use crate::decode::{decode_bytes, AudioFormat};
use crate::error::{Error, Result};
use crate::manifest::{read_manifest, AudioRecordMetadata};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

/// Upper bound on how much we preallocate from the size a zip header claims
const MAX_PREALLOCATION: usize = 1 << 20;

/// A single zipped corpus. The manifest is parsed eagerly when the dataset is opened, audio is
/// only read when an item is requested.
///
/// The archive is reopened on every access instead of holding a handle. This costs a central
/// directory lookup per item but means the dataset is trivially shareable between workers.
#[derive(Debug, Clone)]
pub struct ArchiveDataset {
    path: PathBuf,
    entries: Vec<AudioRecordMetadata>,
}

impl ArchiveDataset {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_manifest(&path)?;
        info!("Loaded {} entries from {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[AudioRecordMetadata] {
        &self.entries
    }

    /// Keeps only the entries matching the predicate, order is preserved
    pub fn retain(&mut self, f: impl FnMut(&AudioRecordMetadata) -> bool) {
        self.entries.retain(f);
    }

    /// Drops every entry whose duration falls outside of `range`. Returns how many were removed.
    pub fn retain_duration(&mut self, range: &DurationRange) -> usize {
        let before = self.entries.len();
        self.retain(|e| range.contains(e.duration()));
        let removed = before - self.entries.len();
        debug!(
            "Duration filter removed {} of {} entries from {}",
            removed,
            before,
            self.path.display()
        );
        removed
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| Error::archive(&self.path, e))?;
        let mut entry = match archive.by_name(name) {
            Ok(e) => e,
            Err(ZipError::FileNotFound) => {
                return Err(Error::archive(
                    &self.path,
                    format!("manifest references missing entry {}", name),
                ))
            }
            Err(e) => return Err(Error::archive(&self.path, e)),
        };
        let mut data = Vec::with_capacity((entry.size() as usize).min(MAX_PREALLOCATION));
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl IndexedDataset for ArchiveDataset {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn metadata(&self, index: usize) -> Result<&AudioRecordMetadata> {
        self.entries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    fn get(&self, index: usize) -> Result<DecodedItem> {
        let metadata = self.metadata(index)?;
        let name = metadata.zip_entry_name.as_str();
        // Check the format before doing any I/O
        AudioFormat::from_name(name)?;
        let data = self.read_entry(name)?;
        let waveform = decode_bytes(name, data)?;
        Ok(DecodedItem {
            waveform,
            text: metadata.text.clone(),
        })
    }
}
