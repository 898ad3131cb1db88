// Audio ingestion module
// Decodes WAV data into a mono clip for candidate feature extraction

use hound::{SampleFormat, WavReader};
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV data: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid audio data")]
    InvalidData,
}

/// Mono audio of one recording
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Samples normalized to f32 in range [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioClip {
            samples,
            sample_rate,
        }
    }

    /// Decode a WAV file from raw bytes, averaging channels to mono
    pub fn from_wav_bytes(data: &[u8]) -> Result<Self, AudioError> {
        decode(WavReader::new(Cursor::new(data))?)
    }

    /// Decode a WAV file from disk
    pub fn from_wav_file(path: impl AsRef<Path>) -> Result<Self, AudioError> {
        let file = std::io::BufReader::new(std::fs::File::open(path)?);
        decode(WavReader::new(file)?)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples between two times in seconds, clamped to the clip
    pub fn window(&self, start: f64, end: f64) -> &[f32] {
        let to_sample = |seconds: f64| ((seconds.max(0.0) * self.sample_rate as f64) as usize).min(self.samples.len());
        let (start, end) = (to_sample(start), to_sample(end));
        if start >= end {
            return &[];
        }
        &self.samples[start..end]
    }
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<AudioClip, AudioError> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(AudioError::InvalidData);
    }

    // Read and normalize samples to f32 [-1.0, 1.0]
    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 128.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8388608.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2147483648.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                format, bits
            )));
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    log::debug!(
        "Decoded {} Hz audio: {} channels, {} mono samples",
        spec.sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioClip::new(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for sample in samples {
                writer.write_sample(*sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono() {
        let clip = AudioClip::from_wav_bytes(&wav_bytes(1, &[0, 16384, -16384, 32767])).unwrap();

        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.samples.len(), 4);
        assert!((clip.samples[1] - 0.5).abs() < 1e-6);
        assert!((clip.samples[2] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_stereo_downmix() {
        // [L, R, L, R]
        let clip = AudioClip::from_wav_bytes(&wav_bytes(2, &[16384, 0, -16384, -16384])).unwrap();

        assert_eq!(clip.samples.len(), 2);
        assert!((clip.samples[0] - 0.25).abs() < 1e-6);
        assert!((clip.samples[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = AudioClip::from_wav_bytes(b"not a wav file");
        assert!(matches!(result, Err(AudioError::WavReadError(_))));
    }

    #[test]
    fn test_decode_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, wav_bytes(1, &[0; 800])).unwrap();

        let clip = AudioClip::from_wav_file(&path).unwrap();

        assert!((clip.duration_secs() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AudioClip::from_wav_file("/nonexistent/clip.wav");
        assert!(matches!(result, Err(AudioError::Io(_))));
    }

    #[test]
    fn test_window_is_clamped() {
        let clip = AudioClip::new(vec![0.0; 1000], 1000);

        assert_eq!(clip.window(0.1, 0.2).len(), 100);
        assert_eq!(clip.window(0.9, 2.0).len(), 100);
        assert!(clip.window(0.5, 0.5).is_empty());
        assert!(clip.window(3.0, 4.0).is_empty());
        assert_eq!(clip.window(-1.0, 0.01).len(), 10);
    }
}
