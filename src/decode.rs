//! Decoding of the audio payloads stored in the corpus archives.
//!
//! Samples are kept at the scale of the source data rather than being normalised here: 16-bit
//! PCM comes out in `[-32768, 32767]` and MP3 is decoded to the same 16-bit scale. The spectrogram
//! extraction divides by `max_wav_value` so it can treat every payload the same way. Float WAV
//! files are passed through untouched, if you have those you want a `max_wav_value` of 1.
use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Mono audio at its native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// Picks the decoder from the file extension of an archive entry
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("wav") => Ok(Self::Wav),
            Some("mp3") => Ok(Self::Mp3),
            _ => Err(Error::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Decode a payload, `name` is used to pick the format and for error messages
pub fn decode_bytes(name: &str, data: Vec<u8>) -> Result<Waveform> {
    match AudioFormat::from_name(name)? {
        AudioFormat::Wav => decode_wav(name, data),
        AudioFormat::Mp3 => decode_mp3(name, data),
    }
}

/// Averages interleaved channels down to one
fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

pub fn decode_wav(name: &str, data: Vec<u8>) -> Result<Waveform> {
    let mut reader = WavReader::new(Cursor::new(data)).map_err(|e| Error::decode(name, e))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32))
            .collect::<std::result::Result<Vec<f32>, _>>(),
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>(),
    }
    .map_err(|e| Error::decode(name, e))?;

    let samples = downmix(samples, spec.channels as usize);
    debug!(
        "Decoded {}: {} samples at {}Hz",
        name,
        samples.len(),
        spec.sample_rate
    );
    Ok(Waveform::new(samples, spec.sample_rate))
}

/// Decodes an MP3 forced down to one channel, samples are on the 16-bit integer scale.
pub fn decode_mp3(name: &str, data: Vec<u8>) -> Result<Waveform> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::decode(name, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::decode(name, "no audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::decode(name, e))?;

    let mut samples = vec![];
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // End of stream
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(Error::decode(name, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt frame, the decoder can carry on from the next one
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping bad frame in {}: {}", name, e);
                continue;
            }
            Err(e) => return Err(Error::decode(name, e)),
        };
        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);

        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        let interleaved = buffer.samples().iter().map(|s| *s as f32).collect();
        samples.extend(downmix(interleaved, spec.channels.count()));
    }

    let sample_rate = sample_rate.ok_or_else(|| Error::decode(name, "unknown sample rate"))?;
    debug!(
        "Decoded {}: {} samples at {}Hz",
        name,
        samples.len(),
        sample_rate
    );
    Ok(Waveform::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::wav_bytes;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn format_from_extension() {
        assert_eq!(AudioFormat::from_name("a/b.wav").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_name("B.WAV").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_name("x.mp3").unwrap(), AudioFormat::Mp3);
        assert!(matches!(
            AudioFormat::from_name("x.flac"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            AudioFormat::from_name("no_extension"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn wav_keeps_length_and_rate() {
        let samples = (0..1234).map(|x| (x % 300) as i16 - 150).collect::<Vec<_>>();
        let data = wav_bytes(22050, &samples);
        let wave = decode_bytes("test.wav", data).unwrap();
        assert_eq!(wave.len(), 1234);
        assert_eq!(wave.sample_rate, 22050);
        assert_eq!(wave.samples[0], -150.0);
        assert_eq!(wave.samples[299], 149.0);
    }

    #[test]
    fn stereo_wav_is_downmixed() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(vec![]);
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..10 {
                writer.write_sample(100i16).unwrap();
                writer.write_sample(300i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        let wave = decode_wav("stereo.wav", cursor.into_inner()).unwrap();
        assert_eq!(wave.len(), 10);
        assert!(wave.samples.iter().all(|x| *x == 200.0));
    }

    #[test]
    fn garbage_payload() {
        assert!(matches!(
            decode_bytes("bad.wav", vec![1, 2, 3, 4]),
            Err(Error::Decode { .. })
        ));
        assert!(matches!(
            decode_bytes("bad.mp3", vec![0; 16]),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn decode_mp3_file() {
        // 64kbps MPEG-2 layer III, mono at 22050Hz
        let data = include_bytes!("test_data/mono_22050.mp3").to_vec();
        let waveform = decode_bytes("clip.MP3", data).unwrap();
        assert_eq!(waveform.sample_rate, 22050);
        assert!(!waveform.is_empty());
        assert!(waveform.duration() > 0.5 && waveform.duration() < 2.0);
        assert!(waveform
            .samples
            .iter()
            .all(|s| s.is_finite() && s.abs() <= 32768.0));
    }
}
