// Continuously ascending/descending (CAD) patterns
// Monotonic stretches of the smoothed contour that may hide a bend, release or slide

use serde::{Deserialize, Serialize};

use super::melody::Melody;
use crate::notes::Interval;

/// Direction of a monotonic pitch trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Rising pitch ("up"): bend, hammer-on or upward slide
    Ascending,
    /// Falling pitch ("down"): release, pull-off or downward slide
    Descending,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }

    fn follows(&self, step: f64) -> bool {
        match self {
            Direction::Ascending => step > 0.0,
            Direction::Descending => step < 0.0,
        }
    }
}

/// A monotonic pitch interval and the contour it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadPattern {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Smoothed contour samples from start to end (inclusive)
    pub contour: Vec<f64>,
}

impl CadPattern {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}

/// Thresholds for CAD pattern selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadConfig {
    /// Minimum duration of the monotonic stretch (seconds)
    pub min_lasting_duration: f64,

    /// Minimum pitch change across the stretch (semitones)
    pub min_pitch_difference: f64,

    /// Maximum pitch change across the stretch (semitones)
    pub max_pitch_difference: f64,
}

impl Default for CadConfig {
    fn default() -> Self {
        CadConfig {
            min_lasting_duration: 0.05,
            min_pitch_difference: 0.8,
            max_pitch_difference: 3.8,
        }
    }
}

/// Source of CAD patterns for a melody
pub trait CadPatternProvider: Send + Sync {
    fn find_patterns(&self, melody: &Melody, direction: Direction, config: &CadConfig) -> Vec<CadPattern>;
}

/// Finds maximal strictly monotonic runs of voiced frames in the smoothed contour
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicCadProvider;

impl CadPatternProvider for MonotonicCadProvider {
    fn find_patterns(&self, melody: &Melody, direction: Direction, config: &CadConfig) -> Vec<CadPattern> {
        let contour = &melody.smoothed;
        let mut patterns = Vec::new();

        let mut start = 0;
        while start < contour.len() {
            let mut end = start;
            if contour[start] > 0.0 {
                while end + 1 < contour.len()
                    && contour[end + 1] > 0.0
                    && direction.follows(contour[end + 1] - contour[end])
                {
                    end += 1;
                }
            }

            if end > start {
                let duration = melody.frame_to_seconds(end - start);
                let difference = (contour[end] - contour[start]).abs();
                if duration >= config.min_lasting_duration
                    && difference >= config.min_pitch_difference
                    && difference <= config.max_pitch_difference
                {
                    patterns.push(CadPattern {
                        start: melody.frame_to_seconds(start),
                        end: melody.frame_to_seconds(end),
                        contour: contour[start..=end].to_vec(),
                    });
                }
                // The turning frame may open a run in the other direction, not this one
                start = end;
            } else {
                start += 1;
            }
        }

        log::debug!("Found {} {} CAD patterns", patterns.len(), direction.name());
        patterns
    }
}
