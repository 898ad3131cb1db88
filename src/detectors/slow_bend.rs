// Slow bend/release detection
// A monotonic contour stretch covering three or four semitone-close notes is one
// slowly bent (or released) note split up by the transcriber

use serde::{Deserialize, Serialize};

use crate::contour::{CadPattern, Direction};
use crate::notes::{register_detection, EsnTable, RawNote, Technique, TsList};

/// Bend/release column value for a slow bend or release
pub const SLOW_BEND_MAGNITUDE: u8 = 3;

/// Number of notes merged into one slow bend
const MERGED_NOTES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowBendConfig {
    /// Smallest index distance between the first and last covered note
    pub min_note_span: usize,

    /// Largest index distance between the first and last covered note
    pub max_note_span: usize,

    /// Largest pitch distance between the first and last covered note (semitones)
    pub max_pitch_difference: i32,
}

impl Default for SlowBendConfig {
    fn default() -> Self {
        SlowBendConfig {
            min_note_span: 2,
            max_note_span: 3,
            max_pitch_difference: 3,
        }
    }
}

/// Split CAD patterns into slow-bend notes and residual short patterns
///
/// A pattern starting in note `n` and ending in note `m` (both inclusive) with
/// `m - n` within the configured span and a small enough pitch distance yields
/// one note with the pitch and onset of `n` lasting over notes `n..n+3`.
/// The first qualifying `(n, m)` wins. Patterns that match nothing are returned
/// as short patterns for candidate selection.
pub fn find_long_patterns(
    notes: &[RawNote],
    patterns: &[CadPattern],
    config: &SlowBendConfig,
) -> (Vec<RawNote>, Vec<CadPattern>) {
    let mut long_notes = Vec::new();
    let mut short_patterns = Vec::new();

    for pattern in patterns {
        match match_pattern(notes, pattern, config) {
            Some(note) => long_notes.push(note),
            None => short_patterns.push(pattern.clone()),
        }
    }

    (long_notes, short_patterns)
}

fn match_pattern(notes: &[RawNote], pattern: &CadPattern, config: &SlowBendConfig) -> Option<RawNote> {
    for (first, note) in notes.iter().enumerate() {
        if !note.contains(pattern.start) {
            continue;
        }

        for last in first + config.min_note_span..=first + config.max_note_span {
            let Some(end_note) = notes.get(last) else {
                break;
            };
            if end_note.contains(pattern.end)
                && (note.pitch - end_note.pitch).abs() <= config.max_pitch_difference
            {
                let duration = notes[first..]
                    .iter()
                    .take(MERGED_NOTES)
                    .map(|n| n.duration)
                    .sum();
                return Some(RawNote::new(note.pitch, note.onset, duration));
            }
        }
    }
    None
}

/// Tables after slow bend detection plus the patterns left for classification
#[derive(Debug, Clone, Default)]
pub struct SlowBendResult {
    pub esn: EsnTable,
    pub ts: TsList,

    /// Number of slow bends and releases registered
    pub detected: usize,

    pub short_ascending: Vec<CadPattern>,
    pub short_descending: Vec<CadPattern>,
}

/// Detects slow bends from ascending and slow releases from descending patterns
#[derive(Debug, Clone, Default)]
pub struct SlowBendDetector {
    config: SlowBendConfig,
}

impl SlowBendDetector {
    pub fn new(config: SlowBendConfig) -> Self {
        SlowBendDetector { config }
    }

    pub fn technique(direction: Direction) -> Technique {
        match direction {
            Direction::Ascending => Technique::Bend,
            Direction::Descending => Technique::Release,
        }
    }

    /// Both directions are matched against the notes as they were before this stage
    pub fn detect(
        &self,
        esn: EsnTable,
        ts: TsList,
        ascending: &[CadPattern],
        descending: &[CadPattern],
    ) -> SlowBendResult {
        let notes = esn.notes();
        let (bends, short_ascending) = find_long_patterns(&notes, ascending, &self.config);
        let (releases, short_descending) = find_long_patterns(&notes, descending, &self.config);

        log::debug!(
            "Slow bend: {} bends, {} releases, {}/{} short patterns left",
            bends.len(),
            releases.len(),
            short_ascending.len(),
            short_descending.len()
        );

        let (esn, ts) = register_detection(
            esn,
            ts,
            &bends,
            Self::technique(Direction::Ascending),
            SLOW_BEND_MAGNITUDE,
        );
        let (esn, ts) = register_detection(
            esn,
            ts,
            &releases,
            Self::technique(Direction::Descending),
            SLOW_BEND_MAGNITUDE,
        );

        SlowBendResult {
            esn,
            ts,
            detected: bends.len() + releases.len(),
            short_ascending,
            short_descending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(start: f64, end: f64) -> CadPattern {
        CadPattern {
            start,
            end,
            contour: Vec::new(),
        }
    }

    fn semitone_steps() -> Vec<RawNote> {
        vec![
            RawNote::new(60, 0.0, 0.1),
            RawNote::new(61, 0.1, 0.1),
            RawNote::new(62, 0.2, 0.1),
            RawNote::new(61, 0.3, 0.1),
            RawNote::new(60, 0.4, 0.1),
            RawNote::new(72, 0.5, 0.5),
        ]
    }

    #[test]
    fn test_three_notes_merge_into_bend() {
        let notes = vec![
            RawNote::new(60, 0.0, 0.1),
            RawNote::new(61, 0.1, 0.1),
            RawNote::new(62, 0.2, 0.1),
        ];

        let (long, short) = find_long_patterns(&notes, &[pattern(0.05, 0.25)], &SlowBendConfig::default());

        assert!(short.is_empty());
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].pitch, 60);
        assert_eq!(long[0].onset, 0.0);
        assert!((long[0].duration - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_four_notes_still_merge_three() {
        let (long, _) = find_long_patterns(&semitone_steps(), &[pattern(0.05, 0.35)], &SlowBendConfig::default());

        assert_eq!(long.len(), 1);
        assert!((long[0].duration - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_index_distance_four_is_short() {
        let patterns = [pattern(0.05, 0.45)];

        let (long, short) = find_long_patterns(&semitone_steps(), &patterns, &SlowBendConfig::default());

        assert!(long.is_empty());
        assert_eq!(short, patterns.to_vec());
    }

    #[test]
    fn test_adjacent_notes_are_short() {
        let (long, short) = find_long_patterns(&semitone_steps(), &[pattern(0.05, 0.15)], &SlowBendConfig::default());

        assert!(long.is_empty());
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn test_pitch_distance_limit() {
        let notes = vec![
            RawNote::new(60, 0.0, 0.1),
            RawNote::new(62, 0.1, 0.1),
            RawNote::new(64, 0.2, 0.1),
        ];

        let (long, _) = find_long_patterns(&notes, &[pattern(0.05, 0.25)], &SlowBendConfig::default());

        assert!(long.is_empty());
    }

    #[test]
    fn test_detect_fuses_bend_and_release() {
        let esn = EsnTable::from_notes(&semitone_steps());
        let ascending = [pattern(0.05, 0.25), pattern(0.52, 0.6)];
        let descending = [pattern(0.25, 0.45)];

        let result = SlowBendDetector::default().detect(esn, TsList::new(), &ascending, &descending);

        // Release starts in note 2, which the bend absorbed, so it matches no row
        assert_eq!(result.detected, 2);
        assert_eq!(result.esn.len(), 4);
        assert_eq!(result.esn.rows()[0].bend, SLOW_BEND_MAGNITUDE);
        assert!((result.esn.rows()[0].duration - 0.3).abs() < 1e-12);
        assert_eq!(result.ts.count(Technique::Bend), 1);
        assert_eq!(result.ts.count(Technique::Release), 1);
        assert_eq!(result.short_ascending, vec![pattern(0.52, 0.6)]);
        assert!(result.short_descending.is_empty());
    }
}
