//! Helpers for building small corpus archives on disk in tests.
use crate::manifest::MANIFEST_NAME;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

pub fn record_line(id: &str, entry: &str, sample_rate: u32, sample_count: u64) -> String {
    serde_json::json!({
        "text": format!("Transcript for {}.", id),
        "zip_entry_name": entry,
        "sample_rate": sample_rate,
        "sample_count": sample_count,
        "id": id,
        "group": "speaker_1",
        "batch": 0,
        "seq_no": 0,
    })
    .to_string()
}

pub fn wav_bytes(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(vec![]);
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn write_zip(path: &Path, files: &[(&str, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, data) in files {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Writes an archive of 16-bit WAV files, one per `(id, sample_count)` pair. The manifest claims
/// the real sample count so durations line up with the payloads.
pub fn write_wav_corpus(path: &Path, sample_rate: u32, items: &[(&str, usize)]) {
    let mut manifest = vec![];
    let mut files = vec![];
    for (id, len) in items {
        let name = format!("{}.wav", id);
        manifest.push(record_line(id, &name, sample_rate, *len as u64));
        let samples = (0..*len)
            .map(|i| (((i as f32) * 0.05).sin() * 8000.0) as i16)
            .collect::<Vec<_>>();
        files.push((name, wav_bytes(sample_rate, &samples)));
    }
    let manifest = manifest.join("\n");
    let mut entries: Vec<(&str, Vec<u8>)> = vec![(MANIFEST_NAME, manifest.into_bytes())];
    entries.extend(files.iter().map(|(n, d)| (n.as_str(), d.clone())));
    write_zip(path, &entries);
}
