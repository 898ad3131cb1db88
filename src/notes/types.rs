// Note and annotation types
// Raw notes, the expression-style note table (ESN) and the time-segment log (TS)

use serde::{Deserialize, Serialize};

/// Playing technique recognized on a note
/// Each variant owns exactly one column of the expression-style note table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// Bend performed before the note is picked (inaudible ascent)
    PreBend,
    /// String bend, magnitude in semitones (0-3)
    Bend,
    /// Release of a bend, magnitude in semitones (0-3)
    Release,
    /// Pull-off: 1 = start, 2 = stop
    Pull,
    /// Hammer-on: 1 = start, 2 = stop
    Hammer,
    /// Legato slide: 1 = start, 2 = stop
    Slide,
    /// Slide in: 1 = from below, 2 = from above
    SlideIn,
    /// Slide out: 1 = downward, 2 = upward
    SlideOut,
    /// Vibrato: 1 = mild, 2 = wide
    Vibrato,
}

impl Technique {
    pub const ALL: [Technique; 9] = [
        Technique::PreBend,
        Technique::Bend,
        Technique::Release,
        Technique::Pull,
        Technique::Hammer,
        Technique::Slide,
        Technique::SlideIn,
        Technique::SlideOut,
        Technique::Vibrato,
    ];

    /// Columns that are not rewritten by the bend chain merge
    pub const ORTHOGONAL: [Technique; 6] = [
        Technique::Pull,
        Technique::Hammer,
        Technique::Slide,
        Technique::SlideIn,
        Technique::SlideOut,
        Technique::Vibrato,
    ];

    /// Column index in the 12-column annotation layout
    /// (pitch, onset and duration occupy columns 0-2)
    pub fn annotation_index(&self) -> usize {
        match self {
            Technique::PreBend => 3,
            Technique::Bend => 4,
            Technique::Release => 5,
            Technique::Pull => 6,
            Technique::Hammer => 7,
            Technique::Slide => 8,
            Technique::SlideIn => 9,
            Technique::SlideOut => 10,
            Technique::Vibrato => 11,
        }
    }

    pub fn from_annotation_index(index: usize) -> Option<Self> {
        Technique::ALL
            .iter()
            .copied()
            .find(|t| t.annotation_index() == index)
    }

    /// Short name used in logs and trace data
    pub fn name(&self) -> &'static str {
        match self {
            Technique::PreBend => "pre-bend",
            Technique::Bend => "bend",
            Technique::Release => "release",
            Technique::Pull => "pull",
            Technique::Hammer => "hamm",
            Technique::Slide => "slide",
            Technique::SlideIn => "slide in",
            Technique::SlideOut => "slide out",
            Technique::Vibrato => "vibrato",
        }
    }
}

/// A transcribed note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawNote {
    /// MIDI note number
    pub pitch: i32,

    /// Onset in seconds
    pub onset: f64,

    /// Duration in seconds
    pub duration: f64,
}

impl RawNote {
    pub fn new(pitch: i32, onset: f64, duration: f64) -> Self {
        RawNote {
            pitch,
            onset,
            duration,
        }
    }

    pub fn offset(&self) -> f64 {
        self.onset + self.duration
    }

    /// True if `time` lies within [onset, offset]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.onset && time <= self.offset()
    }

    /// True if `time` lies within (onset, offset)
    pub fn strictly_contains(&self, time: f64) -> bool {
        time > self.onset && time < self.offset()
    }
}

/// One row of the expression-style note table
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpressionStyleNote {
    pub pitch: i32,
    pub onset: f64,
    pub duration: f64,
    pub pre_bend: u8,
    pub bend: u8,
    pub release: u8,
    pub pull: u8,
    pub hammer: u8,
    pub slide: u8,
    pub slide_in: u8,
    pub slide_out: u8,
    pub vibrato: u8,
}

impl ExpressionStyleNote {
    /// Create an untagged row from a raw note
    pub fn from_note(note: &RawNote) -> Self {
        ExpressionStyleNote {
            pitch: note.pitch,
            onset: note.onset,
            duration: note.duration,
            ..Default::default()
        }
    }

    pub fn offset(&self) -> f64 {
        self.onset + self.duration
    }

    pub fn note(&self) -> RawNote {
        RawNote::new(self.pitch, self.onset, self.duration)
    }

    pub fn technique(&self, technique: Technique) -> u8 {
        match technique {
            Technique::PreBend => self.pre_bend,
            Technique::Bend => self.bend,
            Technique::Release => self.release,
            Technique::Pull => self.pull,
            Technique::Hammer => self.hammer,
            Technique::Slide => self.slide,
            Technique::SlideIn => self.slide_in,
            Technique::SlideOut => self.slide_out,
            Technique::Vibrato => self.vibrato,
        }
    }

    pub fn technique_mut(&mut self, technique: Technique) -> &mut u8 {
        match technique {
            Technique::PreBend => &mut self.pre_bend,
            Technique::Bend => &mut self.bend,
            Technique::Release => &mut self.release,
            Technique::Pull => &mut self.pull,
            Technique::Hammer => &mut self.hammer,
            Technique::Slide => &mut self.slide,
            Technique::SlideIn => &mut self.slide_in,
            Technique::SlideOut => &mut self.slide_out,
            Technique::Vibrato => &mut self.vibrato,
        }
    }

    /// Row in the 12-column annotation layout
    pub fn to_row(&self) -> [f64; 12] {
        let mut row = [0.0; 12];
        row[0] = self.pitch as f64;
        row[1] = self.onset;
        row[2] = self.duration;
        for technique in Technique::ALL {
            row[technique.annotation_index()] = self.technique(technique) as f64;
        }
        row
    }
}

/// The expression-style note table
/// Rows are deleted only through a tombstone mask, compacted once per operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EsnTable {
    rows: Vec<ExpressionStyleNote>,
}

impl EsnTable {
    /// Build a table with zeroed technique columns
    pub fn from_notes(notes: &[RawNote]) -> Self {
        EsnTable {
            rows: notes.iter().map(ExpressionStyleNote::from_note).collect(),
        }
    }

    pub fn from_rows(rows: Vec<ExpressionStyleNote>) -> Self {
        EsnTable { rows }
    }

    pub fn rows(&self) -> &[ExpressionStyleNote] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [ExpressionStyleNote] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The pitch/onset/duration view of every row
    pub fn notes(&self) -> Vec<RawNote> {
        self.rows.iter().map(ExpressionStyleNote::note).collect()
    }

    /// Remove every row whose mask entry is set
    pub fn compact(&mut self, deleted: &[bool]) {
        debug_assert_eq!(deleted.len(), self.rows.len());
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = !deleted.get(index).copied().unwrap_or(false);
            index += 1;
            keep
        });
    }

    /// Export in the 12-column annotation layout
    pub fn to_rows(&self) -> Vec<[f64; 12]> {
        self.rows.iter().map(ExpressionStyleNote::to_row).collect()
    }

    pub fn into_rows(self) -> Vec<ExpressionStyleNote> {
        self.rows
    }
}

/// A [start, end) interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Interval { start, end }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// A technique-tagged time interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub start: f64,
    pub end: f64,
    pub technique: Technique,
}

/// Chronological log of technique-tagged intervals
/// Append-only and kept sorted by start time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TsList {
    segments: Vec<TimeSegment>,
}

impl TsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[TimeSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append segments and restore start-time order (stable, so equal starts keep insertion order)
    pub fn extend(&mut self, segments: impl IntoIterator<Item = TimeSegment>) {
        self.segments.extend(segments);
        self.segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    /// Count of segments carrying a technique
    pub fn count(&self, technique: Technique) -> usize {
        self.segments
            .iter()
            .filter(|s| s.technique == technique)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_index_round_trip() {
        for technique in Technique::ALL {
            let index = technique.annotation_index();
            assert_eq!(Technique::from_annotation_index(index), Some(technique));
        }
        assert_eq!(Technique::from_annotation_index(2), None);
        assert_eq!(Technique::from_annotation_index(12), None);
    }

    #[test]
    fn test_technique_columns_are_independent() {
        let mut row = ExpressionStyleNote::default();
        for (value, technique) in Technique::ALL.iter().enumerate() {
            *row.technique_mut(*technique) = value as u8 + 1;
        }
        for (value, technique) in Technique::ALL.iter().enumerate() {
            assert_eq!(row.technique(*technique), value as u8 + 1);
        }
    }

    #[test]
    fn test_to_row_layout() {
        let mut row = ExpressionStyleNote::from_note(&RawNote::new(66, 1.25, 0.5));
        row.pre_bend = 2;
        row.slide = 1;
        row.slide_in = 2;
        row.slide_out = 1;
        row.vibrato = 1;

        assert_eq!(
            row.to_row(),
            [66.0, 1.25, 0.5, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_compact_removes_marked_rows() {
        let notes = vec![
            RawNote::new(60, 0.0, 1.0),
            RawNote::new(61, 1.0, 1.0),
            RawNote::new(62, 2.0, 1.0),
        ];
        let mut esn = EsnTable::from_notes(&notes);
        esn.compact(&[false, true, false]);

        let pitches: Vec<i32> = esn.rows().iter().map(|r| r.pitch).collect();
        assert_eq!(pitches, vec![60, 62]);
    }

    #[test]
    fn test_rows_survive_table_rebuild() {
        let mut esn = EsnTable::from_notes(&[RawNote::new(60, 0.0, 0.5), RawNote::new(64, 0.5, 1.0)]);
        esn.rows_mut()[1].vibrato = 2;
        let exported = esn.to_rows();

        let rebuilt = EsnTable::from_rows(esn.clone().into_rows());

        assert_eq!(rebuilt, esn);
        assert_eq!(rebuilt.to_rows(), exported);
        assert_eq!(exported[1][11], 2.0);
    }

    #[test]
    fn test_ts_list_stays_sorted() {
        let mut ts = TsList::new();
        ts.extend([
            TimeSegment { start: 2.0, end: 3.0, technique: Technique::Bend },
            TimeSegment { start: 0.5, end: 1.0, technique: Technique::Vibrato },
        ]);
        ts.extend([TimeSegment { start: 1.0, end: 4.0, technique: Technique::Vibrato }]);

        let starts: Vec<f64> = ts.segments().iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0.5, 1.0, 2.0]);
        assert_eq!(ts.count(Technique::Vibrato), 2);
    }

    #[test]
    fn test_strict_and_inclusive_containment() {
        let note = RawNote::new(60, 1.0, 0.5);
        assert!(note.contains(1.0));
        assert!(note.contains(1.5));
        assert!(!note.strictly_contains(1.0));
        assert!(!note.strictly_contains(1.5));
        assert!(note.strictly_contains(1.25));
    }
}
