//! Per-item transforms turning decoded audio into training examples. There are two strategies
//! sharing the same [`TacotronStft`]:
//!
//! 1. Text-to-mel: the whole utterance becomes one spectrogram and the transcript is encoded.
//! 2. Vocoder: a fixed length slice of the waveform is cut out (or padded) *first* and the
//!    spectrogram is computed from just that slice, so audio and mel line up.
//!
//! Nothing here is cached, every access decodes and recomputes.
use crate::audio::TacotronStft;
use crate::config::HParams;
use crate::corpus::Corpus;
use crate::dataset::{Dataset, IndexedDataset};
use crate::decode::Waveform;
use crate::error::{Error, Result};
use crate::text::{text_to_sequence, Cleaner};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Encoded transcript and its mel spectrogram `[n_mel_channels, n_frames]`
#[derive(Debug, Clone, PartialEq)]
pub struct TextMelPair {
    pub tokens: Vec<i64>,
    pub mel: Array2<f32>,
}

/// Mel spectrogram of a fixed length segment alongside the normalised segment itself
#[derive(Debug, Clone, PartialEq)]
pub struct MelSegment {
    pub mel: Array2<f32>,
    pub audio: Array1<f32>,
}

/// We don't resample, if the audio doesn't match the model's rate that's a data problem
fn check_sample_rate(waveform: &Waveform, stft: &TacotronStft) -> Result<()> {
    if waveform.sample_rate != stft.sampling_rate() {
        Err(Error::SampleRateMismatch {
            actual: waveform.sample_rate,
            expected: stft.sampling_rate(),
        })
    } else {
        Ok(())
    }
}

fn normalise(samples: &[f32], max_wav_value: f32) -> Vec<f32> {
    samples.iter().map(|x| x / max_wav_value).collect()
}

#[derive(Debug, Clone)]
pub struct TextMelExtractor {
    stft: Arc<TacotronStft>,
    max_wav_value: f32,
    cleaners: Vec<Cleaner>,
}

impl TextMelExtractor {
    pub fn new(stft: Arc<TacotronStft>, max_wav_value: f32, cleaners: Vec<Cleaner>) -> Self {
        Self {
            stft,
            max_wav_value,
            cleaners,
        }
    }

    pub fn from_hparams(params: &HParams) -> Result<Self> {
        let stft = Arc::new(TacotronStft::from_hparams(params)?);
        let cleaners = Cleaner::parse_all(&params.text_cleaners)?;
        Ok(Self::new(stft, params.max_wav_value, cleaners))
    }

    pub fn stft(&self) -> &Arc<TacotronStft> {
        &self.stft
    }

    /// Mel spectrogram of the full waveform
    pub fn get_mel(&self, waveform: &Waveform) -> Result<Array2<f32>> {
        check_sample_rate(waveform, &self.stft)?;
        let audio = normalise(&waveform.samples, self.max_wav_value);
        self.stft.mel_spectrogram(&audio)
    }

    pub fn get_text(&self, text: &str) -> Vec<i64> {
        text_to_sequence(text, &self.cleaners)
    }

    pub fn extract(&self, waveform: &Waveform, text: &str) -> Result<TextMelPair> {
        // Mel first so a bad sample rate fails before we do anything else
        let mel = self.get_mel(waveform)?;
        let tokens = self.get_text(text);
        Ok(TextMelPair { tokens, mel })
    }
}

/// Takes `len` samples starting at a uniformly random offset, or right pads with zeros if the
/// input is too short.
pub fn take_segment<R: Rng + ?Sized>(samples: &[f32], len: usize, rng: &mut R) -> Vec<f32> {
    if samples.len() >= len {
        let start = rng.gen_range(0..=samples.len() - len);
        samples[start..start + len].to_vec()
    } else {
        let mut segment = samples.to_vec();
        segment.resize(len, 0.0);
        segment
    }
}

#[derive(Debug, Clone)]
pub struct SegmentExtractor {
    stft: Arc<TacotronStft>,
    segment_length: usize,
    max_wav_value: f32,
}

impl SegmentExtractor {
    pub fn new(stft: Arc<TacotronStft>, segment_length: usize, max_wav_value: f32) -> Result<Self> {
        if segment_length == 0 {
            return Err(Error::InvalidConfig(
                "segment_length must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            stft,
            segment_length,
            max_wav_value,
        })
    }

    pub fn from_hparams(params: &HParams) -> Result<Self> {
        let stft = Arc::new(TacotronStft::from_hparams(params)?);
        Self::new(stft, params.segment_length, params.max_wav_value)
    }

    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    pub fn extract<R: Rng + ?Sized>(&self, waveform: &Waveform, rng: &mut R) -> Result<MelSegment> {
        check_sample_rate(waveform, &self.stft)?;
        let segment = take_segment(&waveform.samples, self.segment_length, rng);
        let audio = normalise(&segment, self.max_wav_value);
        let mel = self.stft.mel_spectrogram(&audio)?;
        Ok(MelSegment {
            mel,
            audio: Array1::from(audio),
        })
    }
}

/// Text-to-mel training items over an archive backed dataset.
#[derive(Debug)]
pub struct SpectrogramDataset<D = Corpus> {
    source: D,
    extractor: TextMelExtractor,
}

impl<D: IndexedDataset> SpectrogramDataset<D> {
    pub fn new(source: D, extractor: TextMelExtractor) -> Self {
        Self { source, extractor }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn extractor(&self) -> &TextMelExtractor {
        &self.extractor
    }
}

impl<D: IndexedDataset> Dataset for SpectrogramDataset<D> {
    type Item = TextMelPair;

    fn len(&self) -> usize {
        self.source.len()
    }

    fn get(&self, index: usize, _rng: &mut StdRng) -> Result<TextMelPair> {
        let item = self.source.get(index)?;
        debug!("Extracting spectrogram for item {}", index);
        self.extractor.extract(&item.waveform, &item.text)
    }
}

/// Vocoder training items: random fixed length segments and their spectrograms.
#[derive(Debug)]
pub struct SegmentDataset<D = Corpus> {
    source: D,
    extractor: SegmentExtractor,
}

impl<D: IndexedDataset> SegmentDataset<D> {
    pub fn new(source: D, extractor: SegmentExtractor) -> Self {
        Self { source, extractor }
    }

    pub fn source(&self) -> &D {
        &self.source
    }
}

impl<D: IndexedDataset> Dataset for SegmentDataset<D> {
    type Item = MelSegment;

    fn len(&self) -> usize {
        self.source.len()
    }

    fn get(&self, index: usize, rng: &mut StdRng) -> Result<MelSegment> {
        let item = self.source.get(index)?;
        self.extractor.extract(&item.waveform, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveDataset;
    use crate::test_utils::*;
    use rand::SeedableRng;

    fn params(sampling_rate: u32) -> HParams {
        HParams {
            sampling_rate,
            filter_length: 256,
            hop_length: 64,
            win_length: 256,
            n_mel_channels: 20,
            mel_fmax: None,
            segment_length: 1000,
            text_cleaners: vec!["basic_cleaners".to_string()],
            ..Default::default()
        }
    }

    fn waveform(len: usize, sample_rate: u32) -> Waveform {
        let samples = (0..len)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0).round())
            .collect();
        Waveform::new(samples, sample_rate)
    }

    #[test]
    fn text_mel_pair() {
        let extractor = TextMelExtractor::from_hparams(&params(16000)).unwrap();
        let pair = extractor.extract(&waveform(6400, 16000), "Hello").unwrap();
        assert_eq!(pair.tokens.len(), 5);
        assert_eq!(pair.mel.dim(), (20, 1 + 6400 / 64));
    }

    #[test]
    fn normalisation_applied() {
        let extractor = TextMelExtractor::from_hparams(&params(16000)).unwrap();
        let loud = extractor.get_mel(&waveform(2000, 16000)).unwrap();
        let samples = waveform(2000, 16000)
            .samples
            .iter()
            .map(|x| x / 32768.0)
            .collect::<Vec<_>>();
        let direct = extractor.stft().mel_spectrogram(&samples).unwrap();
        assert_eq!(loud, direct);
    }

    #[test]
    fn sample_rate_mismatch() {
        let extractor = TextMelExtractor::from_hparams(&params(16000)).unwrap();
        match extractor.extract(&waveform(6400, 22050), "Hello") {
            Err(Error::SampleRateMismatch { actual, expected }) => {
                assert_eq!(actual, 22050);
                assert_eq!(expected, 16000);
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        let segments = SegmentExtractor::from_hparams(&params(16000)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            segments.extract(&waveform(6400, 22050), &mut rng),
            Err(Error::SampleRateMismatch { .. })
        ));
    }

    #[test]
    fn short_segment_is_padded() {
        let mut rng = StdRng::seed_from_u64(1);
        let samples = vec![1.0; 300];
        let segment = take_segment(&samples, 1000, &mut rng);
        assert_eq!(segment.len(), 1000);
        assert!(segment[..300].iter().all(|x| *x == 1.0));
        assert!(segment[300..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn long_segment_is_sliced() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples = (0..5000).map(|x| x as f32).collect::<Vec<_>>();
        for _ in 0..100 {
            let segment = take_segment(&samples, 1000, &mut rng);
            assert_eq!(segment.len(), 1000);
            let start = segment[0] as usize;
            assert!(start <= 4000);
            assert_eq!(segment[999] as usize, start + 999);
        }
        // Exact length has only one choice
        let segment = take_segment(&samples[..1000], 1000, &mut rng);
        assert_eq!(segment[0], 0.0);
    }

    #[test]
    fn segment_mel_lines_up() {
        let extractor = SegmentExtractor::from_hparams(&params(16000)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let item = extractor.extract(&waveform(4000, 16000), &mut rng).unwrap();
        assert_eq!(item.audio.len(), 1000);
        assert_eq!(item.mel.dim(), (20, 1 + 1000 / 64));
        assert!(item.audio.iter().all(|x| x.abs() <= 1.0));

        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        assert_eq!(
            extractor.extract(&waveform(4000, 16000), &mut a).unwrap(),
            extractor.extract(&waveform(4000, 16000), &mut b).unwrap()
        );
    }

    #[test]
    fn datasets_over_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.zip");
        write_wav_corpus(&path, 16000, &[("a", 3200), ("b", 640)]);
        let corpus = Corpus::new(vec![ArchiveDataset::open(&path).unwrap()]);
        let hparams = params(16000);

        let spectrograms =
            SpectrogramDataset::new(corpus.clone(), TextMelExtractor::from_hparams(&hparams).unwrap());
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(spectrograms.len(), 2);
        let pair = spectrograms.get(0, &mut rng).unwrap();
        assert_eq!(pair.mel.ncols(), 1 + 3200 / 64);
        assert_eq!(
            crate::text::sequence_to_text(&pair.tokens),
            "transcript for a."
        );

        let segments =
            SegmentDataset::new(corpus, SegmentExtractor::from_hparams(&hparams).unwrap());
        let item = segments.get(1, &mut rng).unwrap();
        assert_eq!(item.audio.len(), 1000);
        assert!(item.audio.iter().skip(640).all(|x| *x == 0.0));
        assert!(segments.get(2, &mut rng).is_err());
    }
}
