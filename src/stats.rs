//! Does some analytics on corpora, mainly to see how much data the duration filter throws away
//! and what's left to train on.
use crate::archive::ArchiveDataset;
use crate::corpus::{split_sizes, DurationRange};
use crate::dataset::IndexedDataset;
use crate::error::Result;
use crate::manifest::AudioRecordMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusReport {
    pub archives: usize,
    /// Records across every manifest before filtering
    pub records: usize,
    /// Records inside the duration range
    pub kept: usize,
    pub too_short: usize,
    pub too_long: usize,
    /// Hours of audio that survive filtering
    pub kept_hours: f64,
    /// Kept records per speaker/group
    pub groups: BTreeMap<String, usize>,
    pub sample_rates: BTreeMap<u32, usize>,
    /// Keyed by file extension of the payload
    pub formats: BTreeMap<String, usize>,
    /// Whole seconds of duration to count, before filtering
    pub duration_histogram: BTreeMap<u64, usize>,
    pub train_size: usize,
    pub validation_size: usize,
}

#[derive(Debug, Default)]
pub struct StatsGenerator {
    range: DurationRange,
    report: CorpusReport,
    kept_seconds: f64,
}

impl StatsGenerator {
    pub fn new(range: DurationRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    /// Call with the archive before any filtering is applied
    pub fn push_archive(&mut self, dataset: &ArchiveDataset) {
        self.report.archives += 1;
        info!(
            "Analysing {} ({} records)",
            dataset.path().display(),
            dataset.len()
        );
        for entry in dataset.entries() {
            self.push_record(entry);
        }
    }

    pub fn push_record(&mut self, entry: &AudioRecordMetadata) {
        let duration = entry.duration();
        self.report.records += 1;
        *self
            .report
            .duration_histogram
            .entry(duration.floor() as u64)
            .or_default() += 1;
        *self
            .report
            .sample_rates
            .entry(entry.sample_rate)
            .or_default() += 1;
        let format = entry
            .zip_entry_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        *self.report.formats.entry(format).or_default() += 1;

        if duration < self.range.min {
            self.report.too_short += 1;
        } else if duration >= self.range.max {
            self.report.too_long += 1;
        } else {
            self.report.kept += 1;
            self.kept_seconds += duration;
            *self.report.groups.entry(entry.group.clone()).or_default() += 1;
        }
    }

    pub fn generate_report(&self, ratios: &[f64]) -> Result<CorpusReport> {
        let (train_size, validation_size) = split_sizes(self.report.kept, ratios)?;
        Ok(CorpusReport {
            kept_hours: self.kept_seconds / 3600.0,
            train_size,
            validation_size,
            ..self.report.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::DEFAULT_SPLIT_RATIOS;
    use crate::test_utils::*;

    #[test]
    fn counts_filtered_records() {
        let mut stats = StatsGenerator::new(DurationRange::default());
        let records = [
            record_line("a", "a.wav", 1000, 1000),
            record_line("b", "b.wav", 1000, 2000),
            record_line("c", "c.MP3", 1000, 3600),
            record_line("d", "d.wav", 1000, 20000),
        ];
        for line in &records {
            let entry: AudioRecordMetadata = serde_json::from_str(line).unwrap();
            stats.push_record(&entry);
        }
        let report = stats.generate_report(&DEFAULT_SPLIT_RATIOS).unwrap();
        assert_eq!(report.records, 4);
        assert_eq!(report.kept, 2);
        assert_eq!(report.too_short, 1);
        assert_eq!(report.too_long, 1);
        assert_eq!(report.groups["speaker_1"], 2);
        assert_eq!(report.formats["wav"], 3);
        assert_eq!(report.formats["mp3"], 1);
        assert_eq!(report.duration_histogram[&3], 1);
        assert!((report.kept_hours - 5.6 / 3600.0).abs() < 1e-9);
        assert_eq!(report.train_size + report.validation_size, 2);
    }

    #[test]
    fn archive_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.zip");
        write_wav_corpus(&path, 1000, &[("a", 2000), ("b", 100)]);
        let mut stats = StatsGenerator::new(DurationRange::default());
        stats.push_archive(&ArchiveDataset::open(&path).unwrap());
        let report = stats.generate_report(&DEFAULT_SPLIT_RATIOS).unwrap();
        assert_eq!(report.archives, 1);
        assert_eq!(report.records, 2);
        assert_eq!(report.kept, 1);
        assert_eq!(report.sample_rates[&1000], 2);
    }
}
