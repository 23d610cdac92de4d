//! Each corpus archive carries a `manifest.jsona` file with one JSON object per line describing
//! an utterance: the transcript, where the audio lives in the zip and enough about the audio to
//! work out its duration without decoding it.
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::Path;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Name of the manifest resource inside every corpus archive
pub const MANIFEST_NAME: &str = "manifest.jsona";

/// Metadata for a single utterance in an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRecordMetadata {
    pub text: String,
    pub zip_entry_name: String,
    pub sample_rate: u32,
    pub sample_count: u64,
    pub id: String,
    pub group: String,
    pub batch: i64,
    pub seq_no: i64,
    #[serde(default)]
    pub bitrate: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl AudioRecordMetadata {
    /// Duration in seconds, worked out from the sample count
    pub fn duration(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate as f64
    }
}

/// Opens the archive and parses the manifest. Either every line parses or the whole load fails.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<AudioRecordMetadata>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::archive(path, e))?;
    let manifest = match archive.by_name(MANIFEST_NAME) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => {
            return Err(Error::archive(path, format!("no {} resource", MANIFEST_NAME)))
        }
        Err(e) => return Err(Error::archive(path, e)),
    };
    parse_manifest(io::BufReader::new(manifest), path)
}

/// Parses newline delimited JSON records. `source` is only used for error messages.
pub fn parse_manifest(
    reader: impl BufRead,
    source: &Path,
) -> Result<Vec<AudioRecordMetadata>> {
    let parse_error = |line: usize, reason: String| Error::RecordParse {
        path: source.to_path_buf(),
        line,
        reason,
    };
    let mut entries = vec![];
    // A trailing newline doesn't produce an extra line here, any other blank line is an error
    for (i, line) in reader.split(b'\n').enumerate() {
        let line_no = i + 1;
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let line = String::from_utf8(line).map_err(|e| parse_error(line_no, e.to_string()))?;
        if line.trim().is_empty() {
            return Err(parse_error(line_no, "blank line".to_string()));
        }
        let record: AudioRecordMetadata =
            serde_json::from_str(&line).map_err(|e| parse_error(line_no, e.to_string()))?;
        if record.sample_rate == 0 {
            return Err(parse_error(
                line_no,
                format!("{} has a sample rate of 0", record.id),
            ));
        }
        if record.text.trim().is_empty() {
            warn!("Transcript for {} is empty", record.id);
        }
        entries.push(record);
    }
    debug!("Parsed {} manifest entries from {}", entries.len(), source.display());
    Ok(entries)
}
