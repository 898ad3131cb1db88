// Wild vibrato detection
// Finds serrated (zig-zag) note runs left by a wide vibrato in the transcription
// and collapses each run into one note tagged as wide vibrato

use serde::{Deserialize, Serialize};

use super::StageResult;
use crate::notes::{register_detection, EsnTable, RawNote, Technique, TsList};

/// Zig-zag height of a "super-wild" vibrato, in semitones
pub const SUPER_WILD_EXTENT: i32 = 2;

/// Zig-zag height of a "wild" vibrato, in semitones
pub const WILD_EXTENT: i32 = 1;

/// Vibrato column value for a wide vibrato
pub const WIDE_VIBRATO: u8 = 2;

/// Configuration for serrated-pattern detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WildVibratoConfig {
    /// Maximum silence between consecutive notes of a run (seconds)
    pub max_gap: f64,

    /// Minimum number of notes for a run to count as vibrato
    pub min_run_notes: usize,
}

impl Default for WildVibratoConfig {
    fn default() -> Self {
        WildVibratoConfig {
            max_gap: 0.01,
            min_run_notes: 5,
        }
    }
}

/// Result of one serration-merge pass
#[derive(Debug, Clone, Default)]
pub struct SerratedMerge {
    /// Input notes with every qualifying run collapsed into one note
    pub merged: Vec<RawNote>,

    /// The collapsed notes, one per qualifying run
    pub vibrato: Vec<RawNote>,
}

/// Collapse runs of notes alternating up and down by exactly `extent` semitones
///
/// A run starts with an upward step of `extent`, continues while every step has
/// magnitude `extent` and the opposite sign of the previous one, and breaks on
/// any gap of `max_gap` or more. Runs shorter than `min_run_notes` are copied
/// through unchanged; their notes are still consumed and never start a new run.
pub fn merge_serrated_runs(notes: &[RawNote], extent: i32, config: &WildVibratoConfig) -> SerratedMerge {
    let mut result = SerratedMerge {
        merged: Vec::with_capacity(notes.len()),
        vibrato: Vec::new(),
    };
    let mut consumed = vec![false; notes.len()];

    for start in 0..notes.len() {
        if consumed[start] {
            continue;
        }

        let starts_run = start + 1 < notes.len()
            && notes[start + 1].pitch - notes[start].pitch == extent
            && gap(&notes[start], &notes[start + 1]) < config.max_gap;

        if !starts_run {
            result.merged.push(notes[start]);
            continue;
        }

        let mut last = start + 1;
        let mut sign = 1;
        while last + 1 < notes.len() {
            let step = notes[last + 1].pitch - notes[last].pitch;
            if step.abs() != extent
                || step.signum() == sign
                || gap(&notes[last], &notes[last + 1]) >= config.max_gap
            {
                break;
            }
            sign = step.signum();
            last += 1;
        }

        let run = &notes[start..=last];
        if run.len() >= config.min_run_notes {
            let first = run[0];
            let note = RawNote::new(first.pitch, first.onset, run[run.len() - 1].offset() - first.onset);
            result.merged.push(note);
            result.vibrato.push(note);
        } else {
            result.merged.extend_from_slice(run);
        }
        consumed[start..=last].fill(true);
    }

    result
}

fn gap(current: &RawNote, next: &RawNote) -> f64 {
    next.onset - current.offset()
}

/// Detects wide vibrato from serrated patterns in the raw transcription
#[derive(Debug, Clone, Default)]
pub struct WildVibratoDetector {
    config: WildVibratoConfig,
}

impl WildVibratoDetector {
    pub fn new(config: WildVibratoConfig) -> Self {
        WildVibratoDetector { config }
    }

    /// Build the expression-style note table from raw notes
    ///
    /// Runs with a two-semitone zig-zag are merged first, then one-semitone
    /// runs over the result. Both kinds are tagged as wide vibrato.
    pub fn detect(&self, raw_notes: &[RawNote]) -> StageResult {
        let super_wild = merge_serrated_runs(raw_notes, SUPER_WILD_EXTENT, &self.config);
        let wild = merge_serrated_runs(&super_wild.merged, WILD_EXTENT, &self.config);

        let esn = EsnTable::from_notes(&wild.merged);
        let ts = TsList::new();

        let (esn, ts) = register_detection(esn, ts, &super_wild.vibrato, Technique::Vibrato, WIDE_VIBRATO);
        let (esn, ts) = register_detection(esn, ts, &wild.vibrato, Technique::Vibrato, WIDE_VIBRATO);

        log::debug!(
            "Wild vibrato: {} super-wild, {} wild runs merged ({} -> {} notes)",
            super_wild.vibrato.len(),
            wild.vibrato.len(),
            raw_notes.len(),
            esn.len()
        );

        StageResult {
            esn,
            ts,
            detected: super_wild.vibrato.len() + wild.vibrato.len(),
        }
    }
}
