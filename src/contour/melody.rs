// Melody contour
// Frame-level pitch contours supplied by the melody extractor

use serde::{Deserialize, Serialize};

/// Pitch contours of one recording, sampled every `hop` audio samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    /// Smoothed contour in MIDI semitones (0 = unvoiced)
    pub smoothed: Vec<f64>,

    /// Unsmoothed contour in Hz (0 = unvoiced)
    pub raw: Vec<f64>,

    /// Hop size of the contour in audio samples
    pub hop: usize,

    /// Sample rate of the audio the contour was extracted from
    pub sample_rate: u32,
}

impl Melody {
    pub fn new(smoothed: Vec<f64>, raw: Vec<f64>, hop: usize, sample_rate: u32) -> Self {
        Melody {
            smoothed,
            raw,
            hop,
            sample_rate,
        }
    }

    /// Contour frames per second
    pub fn frame_rate(&self) -> f64 {
        if self.hop == 0 {
            return 0.0;
        }
        self.sample_rate as f64 / self.hop as f64
    }

    /// Length of one contour frame in seconds
    pub fn frame_duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.hop as f64 / self.sample_rate as f64
    }

    /// Time in seconds of a frame index
    pub fn frame_to_seconds(&self, frame: usize) -> f64 {
        frame as f64 * self.frame_duration()
    }

    /// Nearest frame index of a time in seconds
    pub fn seconds_to_frame(&self, seconds: f64) -> usize {
        (seconds * self.frame_rate()).round().max(0.0) as usize
    }
}
