// Long slide detection
// Finds long downward staircases ("ladders") in the quantized melody contour
// and tags the notes they cover as slide-out

use serde::{Deserialize, Serialize};

use super::StageResult;
use crate::contour::{frame_to_notes, quantize, Melody};
use crate::notes::{register_detection, EsnTable, Interval, RawNote, Technique, TsList, TIME_EPSILON};

/// Slide-out column value for a downward slide
pub const SLIDE_OUT_DOWNWARD: u8 = 1;

/// Configuration for ladder detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LongSlideConfig {
    /// Shortest accepted note inside a ladder (seconds)
    pub min_transition_note_duration: f64,

    /// Longest accepted note inside a ladder (seconds)
    pub max_transition_note_duration: f64,

    /// Minimum number of notes in a ladder, first note included
    pub min_ladder_steps: usize,
}

impl Default for LongSlideConfig {
    fn default() -> Self {
        LongSlideConfig {
            min_transition_note_duration: 0.015,
            max_transition_note_duration: 0.09,
            min_ladder_steps: 5,
        }
    }
}

impl LongSlideConfig {
    fn accepts_step(&self, note: &RawNote) -> bool {
        note.duration >= self.min_transition_note_duration
            && note.duration <= self.max_transition_note_duration
    }
}

/// Find descending one-semitone staircases in contour notes
///
/// A ladder starts at any unconsumed note and extends while the next note is
/// exactly one semitone lower and short enough to be a transition note. The
/// first note's own duration is not checked. Every ladder note is consumed,
/// qualifying or not.
pub fn find_ladders(notes: &[RawNote], config: &LongSlideConfig) -> Vec<Interval> {
    let mut ladders = Vec::new();
    let mut consumed = vec![false; notes.len()];

    for start in 0..notes.len() {
        if consumed[start] || notes[start].pitch == 0 {
            continue;
        }

        let mut last = start;
        while last + 1 < notes.len()
            && notes[last + 1].pitch + 1 == notes[last].pitch
            && config.accepts_step(&notes[last + 1])
        {
            last += 1;
        }

        if last - start + 1 >= config.min_ladder_steps {
            ladders.push(Interval::new(notes[start].onset, notes[last].offset()));
        }
        consumed[start..=last].fill(true);
    }

    ladders
}

/// Map ladder intervals back onto the current notes
///
/// The note strictly containing the interval start gives the pitch and onset.
/// The projected note ends at the offset of the first later note reaching the
/// interval end, or at the interval end itself when that note starts after it
/// (or no note reaches it).
pub fn project_onto_notes(intervals: &[Interval], notes: &[RawNote]) -> Vec<RawNote> {
    let mut projected = Vec::new();

    for interval in intervals {
        for (index, note) in notes.iter().enumerate() {
            if !note.strictly_contains(interval.start) {
                continue;
            }

            let offset = notes[index + 1..]
                .iter()
                .find(|later| later.offset() >= interval.end - TIME_EPSILON)
                .map(|later| {
                    if later.onset > interval.end + TIME_EPSILON {
                        interval.end
                    } else {
                        later.offset()
                    }
                })
                .unwrap_or(interval.end);

            projected.push(RawNote::new(note.pitch, note.onset, offset - note.onset));
        }
    }

    projected
}

/// Detects long slide-outs from the smoothed melody contour
#[derive(Debug, Clone, Default)]
pub struct LongSlideDetector {
    config: LongSlideConfig,
}

impl LongSlideDetector {
    pub fn new(config: LongSlideConfig) -> Self {
        LongSlideDetector { config }
    }

    pub fn detect(&self, esn: EsnTable, ts: TsList, melody: &Melody) -> StageResult {
        let quantized = quantize(&melody.smoothed);
        let contour_notes = frame_to_notes(&quantized, melody.hop, melody.sample_rate);
        let ladders = find_ladders(&contour_notes, &self.config);
        let slides = project_onto_notes(&ladders, &esn.notes());

        log::debug!(
            "Long slide: {} contour notes, {} ladders, {} projected slides",
            contour_notes.len(),
            ladders.len(),
            slides.len()
        );

        let (esn, ts) = register_detection(esn, ts, &slides, Technique::SlideOut, SLIDE_OUT_DOWNWARD);
        StageResult {
            esn,
            ts,
            detected: slides.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOP: usize = 256;
    const SAMPLE_RATE: u32 = 44100;

    fn staircase(steps: usize) -> Vec<RawNote> {
        let mut notes = vec![RawNote::new(65, 0.0, 0.1)];
        for step in 1..steps {
            let onset = 0.1 + (step - 1) as f64 * 0.02;
            notes.push(RawNote::new(65 - step as i32, onset, 0.02));
        }
        notes
    }

    /// 5 silent frames, a held note, then 3-frame steps down and a landing note
    fn ladder_melody(steps: usize) -> Melody {
        let mut smoothed = vec![0.0; 5];
        smoothed.extend(vec![65.0; 20]);
        for step in 1..steps {
            smoothed.extend(vec![65.0 - step as f64; 3]);
        }
        smoothed.extend(vec![50.0; 30]);
        let raw = vec![0.0; smoothed.len()];
        Melody::new(smoothed, raw, HOP, SAMPLE_RATE)
    }

    fn seconds(frames: usize) -> f64 {
        frames as f64 * HOP as f64 / SAMPLE_RATE as f64
    }

    #[test]
    fn test_five_step_ladder_found() {
        let ladders = find_ladders(&staircase(5), &LongSlideConfig::default());

        assert_eq!(ladders.len(), 1);
        assert_eq!(ladders[0].start, 0.0);
        assert!((ladders[0].end - 0.18).abs() < 1e-12);
    }

    #[test]
    fn test_four_step_ladder_rejected() {
        assert!(find_ladders(&staircase(4), &LongSlideConfig::default()).is_empty());
    }

    #[test]
    fn test_ladder_step_duration_window() {
        let mut notes = staircase(6);
        // A held note in the middle breaks the ladder into 3 + 3 notes
        notes[3].duration = 0.2;

        assert!(find_ladders(&notes, &LongSlideConfig::default()).is_empty());
    }

    #[test]
    fn test_ladder_reaches_last_note() {
        let mut notes = staircase(5);
        notes.insert(0, RawNote::new(40, -1.0, 0.5));

        let ladders = find_ladders(&notes, &LongSlideConfig::default());

        assert_eq!(ladders.len(), 1);
        assert!((ladders[0].end - notes[5].offset()).abs() < 1e-12);
    }

    #[test]
    fn test_projection_ends_at_reaching_note() {
        let notes = vec![
            RawNote::new(65, 0.0, 0.1),
            RawNote::new(63, 0.1, 0.1),
            RawNote::new(50, 0.2, 0.5),
        ];

        let projected = project_onto_notes(&[Interval::new(0.03, 0.21)], &notes);

        assert_eq!(projected, vec![RawNote::new(65, 0.0, 0.7)]);
    }

    #[test]
    fn test_projection_clips_at_gap() {
        let notes = vec![
            RawNote::new(65, 0.0, 0.1),
            RawNote::new(63, 0.1, 0.1),
            RawNote::new(50, 0.25, 0.5),
        ];

        let projected = project_onto_notes(&[Interval::new(0.03, 0.21)], &notes);
        assert_eq!(projected.len(), 1);
        assert!((projected[0].duration - 0.21).abs() < 1e-12);

        // Nothing reaches the interval end
        let projected = project_onto_notes(&[Interval::new(0.03, 2.0)], &notes);
        assert!((projected[0].offset() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_needs_strict_containment() {
        let notes = vec![RawNote::new(65, 0.0, 0.1), RawNote::new(63, 0.1, 0.1)];
        assert!(project_onto_notes(&[Interval::new(0.1, 0.15)], &notes).is_empty());
    }

    #[test]
    fn test_detect_tags_slide_out() {
        let melody = ladder_melody(5);
        let ladder_end = seconds(37);
        let esn = EsnTable::from_notes(&[
            RawNote::new(65, 0.0, 0.1),
            RawNote::new(63, 0.1, 0.1),
            RawNote::new(50, 0.25, 0.5),
        ]);

        let result = LongSlideDetector::default().detect(esn, TsList::new(), &melody);

        assert_eq!(result.detected, 1);
        assert_eq!(result.esn.len(), 2);
        let slide = result.esn.rows()[0];
        assert_eq!(slide.slide_out, SLIDE_OUT_DOWNWARD);
        assert!((slide.offset() - ladder_end).abs() < 1e-9);
        assert_eq!(result.esn.rows()[1].pitch, 50);
        assert_eq!(result.esn.rows()[1].slide_out, 0);
        assert_eq!(result.ts.count(Technique::SlideOut), 1);
        assert!((result.ts.segments()[0].end - ladder_end).abs() < 1e-9);
    }

    #[test]
    fn test_detect_four_steps_is_noop() {
        let melody = ladder_melody(4);
        let esn = EsnTable::from_notes(&[RawNote::new(65, 0.0, 0.1), RawNote::new(50, 0.1, 0.5)]);
        let before = esn.clone();

        let result = LongSlideDetector::default().detect(esn, TsList::new(), &melody);

        assert_eq!(result.esn, before);
        assert!(result.ts.is_empty());
        assert_eq!(result.detected, 0);
    }
}
