// Vibrato estimation
// Per-frame vibrato rate and extent of a pitch contour slice

use serde::{Deserialize, Serialize};

/// Per-frame vibrato estimate; zero where no vibrato was found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VibratoEstimate {
    /// Vibrato rate in Hz
    pub frequency: Vec<f64>,

    /// Vibrato extent in cents (peak to peak)
    pub extent: Vec<f64>,
}

impl VibratoEstimate {
    /// An estimate with no vibrato on any of `frames` frames
    pub fn none(frames: usize) -> Self {
        VibratoEstimate {
            frequency: vec![0.0; frames],
            extent: vec![0.0; frames],
        }
    }

    /// True if both the rate and the extent are non-zero somewhere
    pub fn has_vibrato(&self) -> bool {
        self.frequency.iter().any(|f| *f != 0.0) && self.extent.iter().any(|e| *e != 0.0)
    }
}

/// Estimates vibrato on a slice of the raw (Hz) pitch contour
pub trait VibratoEstimator: Send + Sync {
    fn estimate(&self, contour: &[f64], frame_rate: f64) -> VibratoEstimate;
}

/// Acceptance ranges for vibrato
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VibratoConfig {
    /// Slowest accepted vibrato rate (Hz)
    pub min_frequency: f64,

    /// Fastest accepted vibrato rate (Hz)
    pub max_frequency: f64,

    /// Narrowest accepted extent (cents, peak to peak)
    pub min_extent: f64,

    /// Widest accepted extent (cents, peak to peak)
    pub max_extent: f64,

    /// Consecutive qualifying half cycles needed to report vibrato
    pub min_half_cycles: usize,
}

impl Default for VibratoConfig {
    fn default() -> Self {
        VibratoConfig {
            min_frequency: 4.0,
            max_frequency: 8.0,
            min_extent: 50.0,
            max_extent: 250.0,
            min_half_cycles: 2,
        }
    }
}

/// Finds regular pitch oscillations by measuring the half cycles between
/// successive extrema of the detrended contour (in cents)
#[derive(Debug, Clone, Default)]
pub struct OscillationVibratoEstimator {
    config: VibratoConfig,
}

impl OscillationVibratoEstimator {
    pub fn new(config: VibratoConfig) -> Self {
        OscillationVibratoEstimator { config }
    }

    fn accepts(&self, frequency: f64, extent: f64) -> bool {
        frequency >= self.config.min_frequency
            && frequency <= self.config.max_frequency
            && extent >= self.config.min_extent
            && extent <= self.config.max_extent
    }
}

impl VibratoEstimator for OscillationVibratoEstimator {
    fn estimate(&self, contour: &[f64], frame_rate: f64) -> VibratoEstimate {
        let mut estimate = VibratoEstimate::none(contour.len());
        if frame_rate <= 0.0 || self.config.min_frequency <= 0.0 {
            return estimate;
        }

        // At least one full cycle of the slowest vibrato must be voiced
        let period = (frame_rate / self.config.min_frequency).round() as usize;
        let voiced: Vec<f64> = contour.iter().copied().filter(|f| *f > 0.0).collect();
        if voiced.len() < period.max(3) {
            return estimate;
        }

        let reference = voiced.iter().sum::<f64>() / voiced.len() as f64;
        let cents: Vec<f64> = contour
            .iter()
            .map(|f| if *f > 0.0 { 1200.0 * (f / reference).log2() } else { 0.0 })
            .collect();
        let deviation = detrend(&cents, period);
        let extrema = alternating_extrema(&deviation);

        // Runs of consecutive accepted half cycles
        let mut run: Vec<(usize, usize, f64, f64)> = Vec::new();
        let mut flush = |run: &mut Vec<(usize, usize, f64, f64)>, estimate: &mut VibratoEstimate| {
            if run.len() >= self.config.min_half_cycles {
                for &(from, to, frequency, extent) in run.iter() {
                    for frame in from..=to {
                        estimate.frequency[frame] = frequency;
                        estimate.extent[frame] = extent;
                    }
                }
            }
            run.clear();
        };

        for pair in extrema.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let voiced_span = contour[from..=to].iter().all(|f| *f > 0.0);
            let frequency = frame_rate / (2.0 * (to - from) as f64);
            let extent = (deviation[to] - deviation[from]).abs();

            if voiced_span && self.accepts(frequency, extent) {
                run.push((from, to, frequency, extent));
            } else {
                flush(&mut run, &mut estimate);
            }
        }
        flush(&mut run, &mut estimate);

        estimate
    }
}

/// Subtract a centered moving average spanning one vibrato period
fn detrend(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let from = i.saturating_sub(half);
            let to = (i + half + 1).min(values.len());
            let mean = values[from..to].iter().sum::<f64>() / (to - from) as f64;
            values[i] - mean
        })
        .collect()
}

/// Indices of local maxima and minima, forced to alternate
fn alternating_extrema(values: &[f64]) -> Vec<usize> {
    let mut extrema: Vec<(usize, bool)> = Vec::new();

    for i in 1..values.len().saturating_sub(1) {
        let is_max = values[i] > values[i - 1] && values[i] >= values[i + 1];
        let is_min = values[i] < values[i - 1] && values[i] <= values[i + 1];
        if !is_max && !is_min {
            continue;
        }

        match extrema.last_mut() {
            // Two maxima (or minima) in a row: keep the more extreme one
            Some((last, last_is_max)) if *last_is_max == is_max => {
                let more_extreme = if is_max {
                    values[i] > values[*last]
                } else {
                    values[i] < values[*last]
                };
                if more_extreme {
                    *last = i;
                }
            }
            _ => extrema.push((i, is_max)),
        }
    }

    extrema.into_iter().map(|(i, _)| i).collect()
}
