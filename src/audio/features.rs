// Spectral feature extraction
// Timbre features of candidate windows and the spectral change across each window

use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::audio::AudioClip;
use crate::classify::{ClassifierError, FeatureExtractor};
use crate::notes::Interval;

/// Length of the feature vector produced per window
pub const FEATURE_COUNT: usize = 8;

/// Configuration for spectral feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralFeatureConfig {
    /// Maximum FFT size in samples; shorter windows use their own length
    pub fft_size: usize,

    /// Upper edge of the low band (Hz)
    pub low_band_hz: f32,

    /// Upper edge of the mid band (Hz)
    pub mid_band_hz: f32,

    /// Fraction of spectral energy below the rolloff frequency
    pub rolloff_fraction: f32,
}

impl Default for SpectralFeatureConfig {
    fn default() -> Self {
        SpectralFeatureConfig {
            fft_size: 2048,
            low_band_hz: 400.0,
            mid_band_hz: 2000.0,
            rolloff_fraction: 0.85,
        }
    }
}

/// Default feature extractor for candidate windows
///
/// Per window: spectral centroid, zero-crossing rate, low/mid/high band
/// energy ratios, RMS, spectral rolloff and the spectral flux between the
/// first and second half.
#[derive(Debug, Clone, Default)]
pub struct SpectralFeatureExtractor {
    config: SpectralFeatureConfig,
}

impl SpectralFeatureExtractor {
    pub fn new(config: SpectralFeatureConfig) -> Self {
        SpectralFeatureExtractor { config }
    }

    fn window_features(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f64>, ClassifierError> {
        if samples.len() < 4 {
            return Ok(vec![0.0; FEATURE_COUNT]);
        }

        let fft_size = samples.len().min(self.config.fft_size);
        let spectrum = magnitude_spectrum(samples, fft_size)?;

        let half = samples.len() / 2;
        let half_size = half.min(self.config.fft_size);
        let first = magnitude_spectrum(&samples[..half], half_size)?;
        let second = magnitude_spectrum(&samples[half..], half_size)?;

        let bands = band_energies(&spectrum, sample_rate, fft_size, self.config.low_band_hz, self.config.mid_band_hz);
        let features = [
            spectral_centroid(&spectrum, sample_rate, fft_size),
            zero_crossing_rate(samples),
            bands[0],
            bands[1],
            bands[2],
            rms(samples),
            spectral_rolloff(&spectrum, sample_rate, fft_size, self.config.rolloff_fraction),
            spectral_flux(&first, &second),
        ];
        Ok(features.iter().map(|f| *f as f64).collect())
    }
}

impl FeatureExtractor for SpectralFeatureExtractor {
    fn extract(&self, audio: &AudioClip, windows: &[Interval]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        windows
            .iter()
            .map(|window| self.window_features(audio.window(window.start, window.end), audio.sample_rate))
            .collect()
    }
}

/// Rate of sign changes in the signal
fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Hann-windowed magnitude spectrum of the first `size` samples
fn magnitude_spectrum(samples: &[f32], size: usize) -> Result<Vec<f32>, ClassifierError> {
    let mut windowed = vec![0.0; size];
    let copy_len = samples.len().min(size);
    windowed[..copy_len].copy_from_slice(&samples[..copy_len]);
    apply_hann_window(&mut windowed);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(size);
    let mut spectrum = fft.make_output_vec();
    fft.process(&mut windowed, &mut spectrum)
        .map_err(|e| ClassifierError::FeatureExtractionError(e.to_string()))?;

    Ok(spectrum.iter().map(|c| c.norm()).collect())
}

fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    for (i, sample) in samples.iter_mut().enumerate() {
        *sample *= 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos());
    }
}

/// Center of mass of the spectrum in Hz
fn spectral_centroid(spectrum: &[f32], sample_rate: u32, fft_size: usize) -> f32 {
    let bin_width = sample_rate as f32 / fft_size as f32;
    let total: f32 = spectrum.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    spectrum
        .iter()
        .enumerate()
        .map(|(i, magnitude)| i as f32 * bin_width * magnitude)
        .sum::<f32>()
        / total
}

/// Energy ratios of the low, mid and high bands
fn band_energies(spectrum: &[f32], sample_rate: u32, fft_size: usize, low_hz: f32, mid_hz: f32) -> [f32; 3] {
    let bin_width = sample_rate as f32 / fft_size as f32;
    let low_max_bin = (low_hz / bin_width) as usize;
    let mid_max_bin = (mid_hz / bin_width) as usize;

    let mut energies = [0.0f32; 3];
    for (i, magnitude) in spectrum.iter().enumerate() {
        let band = if i < low_max_bin {
            0
        } else if i < mid_max_bin {
            1
        } else {
            2
        };
        energies[band] += magnitude * magnitude;
    }

    let total: f32 = energies.iter().sum();
    if total > 0.0 {
        energies.map(|e| e / total)
    } else {
        [0.0; 3]
    }
}

/// Frequency below which `fraction` of the spectral energy lies
fn spectral_rolloff(spectrum: &[f32], sample_rate: u32, fft_size: usize, fraction: f32) -> f32 {
    let bin_width = sample_rate as f32 / fft_size as f32;
    let total: f32 = spectrum.iter().map(|m| m * m).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let mut cumulative = 0.0;
    for (i, magnitude) in spectrum.iter().enumerate() {
        cumulative += magnitude * magnitude;
        if cumulative >= fraction * total {
            return i as f32 * bin_width;
        }
    }
    (spectrum.len().saturating_sub(1)) as f32 * bin_width
}

/// Sum of positive magnitude increases from one spectrum to the next, normalized
fn spectral_flux(previous: &[f32], current: &[f32]) -> f32 {
    let total: f32 = previous.iter().sum::<f32>() + current.iter().sum::<f32>();
    if total <= 0.0 {
        return 0.0;
    }

    let flux: f32 = previous
        .iter()
        .zip(current)
        .map(|(p, c)| (c - p).max(0.0))
        .sum();
    flux / total
}
