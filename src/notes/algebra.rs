// Interval/note algebra
// Shared primitives used by every detector: note to time-segment conversion,
// time-segment accumulation and the detection fusion rule

use super::types::{EsnTable, ExpressionStyleNote, Interval, RawNote, Technique, TimeSegment, TsList};

/// Tolerance for comparing times built from different sums of onsets and durations
pub const TIME_EPSILON: f64 = 1e-9;

fn same_time(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

/// Map each note to the interval it occupies; pitch is dropped
pub fn note_to_time_segment(notes: &[RawNote]) -> Vec<Interval> {
    notes
        .iter()
        .map(|note| Interval::new(note.onset, note.offset()))
        .collect()
}

/// Append one segment per interval, tagged with `technique`, and re-sort by start
/// Overlapping segments are kept as they are
pub fn append_time_segment(mut ts: TsList, segments: &[Interval], technique: Technique) -> TsList {
    ts.extend(segments.iter().map(|segment| TimeSegment {
        start: segment.start,
        end: segment.end,
        technique,
    }));
    ts
}

/// Merge detected notes into the expression-style note table
///
/// Every row sharing a detected note's onset is tagged with `magnitude` in the
/// `technique` column and set to the detected duration. When the detection is
/// longer than the row, the following rows are walked until one reaches the
/// detected offset: rows passed on the way are deleted, and the final row is
/// deleted as well unless its onset lies beyond the detected offset.
///
/// Deletions are collected in a mask and applied once at the end, so row
/// indices stay stable while the detections are scanned.
pub fn fuse_detection(
    mut esn: EsnTable,
    detected: &[RawNote],
    technique: Technique,
    magnitude: u8,
) -> EsnTable {
    let mut deleted = vec![false; esn.len()];

    for note in detected {
        let detected_offset = note.offset();

        for index in 0..esn.len() {
            if deleted[index] || !same_time(esn.rows()[index].onset, note.onset) {
                continue;
            }

            if esn.rows()[index].duration < note.duration - TIME_EPSILON {
                for next in index + 1..esn.len() {
                    if deleted[next] {
                        continue;
                    }
                    let row = esn.rows()[next];
                    if row.offset() >= detected_offset - TIME_EPSILON {
                        // A row starting after the detection ends is a gap, not part of it
                        if row.onset <= detected_offset + TIME_EPSILON {
                            deleted[next] = true;
                        }
                        break;
                    }
                    deleted[next] = true;
                }
            }

            tag(&mut esn.rows_mut()[index], note.duration, technique, magnitude);
        }
    }

    let removed = deleted.iter().filter(|d| **d).count();
    if removed > 0 {
        log::debug!(
            "Fused {} {} detections, absorbed {} rows",
            detected.len(),
            technique.name(),
            removed
        );
    }

    esn.compact(&deleted);
    esn
}

fn tag(row: &mut ExpressionStyleNote, duration: f64, technique: Technique, magnitude: u8) {
    row.duration = duration;
    *row.technique_mut(technique) = magnitude;
}

/// Log detections in the TS list and fuse them into the ESN table
pub fn register_detection(
    esn: EsnTable,
    ts: TsList,
    detected: &[RawNote],
    technique: Technique,
    magnitude: u8,
) -> (EsnTable, TsList) {
    let ts = append_time_segment(ts, &note_to_time_segment(detected), technique);
    let esn = fuse_detection(esn, detected, technique, magnitude);
    (esn, ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(spans: &[(f64, f64)]) -> EsnTable {
        let notes: Vec<RawNote> = spans
            .iter()
            .enumerate()
            .map(|(i, (start, end))| RawNote::new(60 + i as i32, *start, end - start))
            .collect();
        EsnTable::from_notes(&notes)
    }

    fn spans(esn: &EsnTable) -> Vec<(f64, f64)> {
        esn.rows().iter().map(|r| (r.onset, r.offset())).collect()
    }

    #[test]
    fn test_note_to_time_segment_round_trip() {
        let notes = vec![
            RawNote::new(60, 0.0, 0.5),
            RawNote::new(62, 0.5, 0.25),
            RawNote::new(64, 1.0, 1.125),
        ];

        let segments = note_to_time_segment(&notes);
        for (note, segment) in notes.iter().zip(segments.iter()) {
            assert_eq!(segment.start, note.onset);
            assert_eq!(segment.end - segment.start, note.duration);
        }
    }

    #[test]
    fn test_append_time_segment_sorts_and_keeps_overlaps() {
        let ts = append_time_segment(
            TsList::new(),
            &[Interval::new(2.0, 3.0), Interval::new(0.0, 1.0)],
            Technique::Vibrato,
        );
        let ts = append_time_segment(ts, &[Interval::new(0.5, 2.5)], Technique::Bend);

        let starts: Vec<f64> = ts.segments().iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0.0, 0.5, 2.0]);
        assert_eq!(ts.segments()[1].technique, Technique::Bend);
    }

    #[test]
    fn test_fuse_shrinks_longer_row() {
        let esn = table(&[(0.0, 2.0), (2.0, 3.0)]);
        let detected = [RawNote::new(60, 0.0, 1.5)];

        let esn = fuse_detection(esn, &detected, Technique::Vibrato, 1);

        assert_eq!(esn.len(), 2);
        assert_eq!(esn.rows()[0].duration, 1.5);
        assert_eq!(esn.rows()[0].vibrato, 1);
        assert_eq!(esn.rows()[1].vibrato, 0);
    }

    #[test]
    fn test_fuse_without_onset_match_is_noop() {
        let esn = table(&[(0.0, 1.0), (1.0, 2.0)]);
        let before = esn.clone();

        let esn = fuse_detection(esn, &[RawNote::new(60, 0.5, 1.0)], Technique::Bend, 3);

        assert_eq!(esn, before);
    }

    #[test]
    fn test_fuse_keeps_row_beyond_gap() {
        // [0,1) [1,2) gap [4,5); detection [0,3.5)
        let esn = table(&[(0.0, 1.0), (1.0, 2.0), (4.0, 5.0)]);

        let esn = fuse_detection(esn, &[RawNote::new(60, 0.0, 3.5)], Technique::SlideOut, 1);

        assert_eq!(spans(&esn), vec![(0.0, 3.5), (4.0, 5.0)]);
        assert_eq!(esn.rows()[0].slide_out, 1);
        assert_eq!(esn.rows()[1].slide_out, 0);
    }

    #[test]
    fn test_fuse_absorbs_overlapping_row_after_gap() {
        // [3,4) starts before the detection ends, so it is absorbed
        let esn = table(&[(0.0, 1.0), (1.0, 2.0), (3.0, 4.0)]);

        let esn = fuse_detection(esn, &[RawNote::new(60, 0.0, 3.5)], Technique::SlideOut, 1);

        assert_eq!(spans(&esn), vec![(0.0, 3.5)]);
    }

    #[test]
    fn test_fuse_row_starting_at_detected_offset_is_absorbed() {
        let esn = table(&[(0.0, 1.0), (1.0, 2.0), (3.5, 4.5), (4.5, 5.0)]);

        let esn = fuse_detection(esn, &[RawNote::new(60, 0.0, 3.5)], Technique::Bend, 3);

        assert_eq!(spans(&esn), vec![(0.0, 3.5), (4.5, 5.0)]);
    }

    #[test]
    fn test_fuse_row_ending_at_detected_offset_stops_walk() {
        let esn = table(&[(0.0, 1.0), (1.0, 3.5), (3.5, 4.0)]);

        let esn = fuse_detection(esn, &[RawNote::new(60, 0.0, 3.5)], Technique::Bend, 3);

        assert_eq!(spans(&esn), vec![(0.0, 3.5), (3.5, 4.0)]);
        assert_eq!(esn.rows()[0].bend, 3);
    }

    #[test]
    fn test_fuse_sum_of_durations_matches_offset() {
        // 0.1 + 0.2 + 0.3 is not exactly 0.6 in binary floating point
        let notes = vec![
            RawNote::new(60, 0.0, 0.1),
            RawNote::new(61, 0.1, 0.2),
            RawNote::new(62, 0.1 + 0.2, 0.3),
            RawNote::new(63, 0.1 + 0.2 + 0.3, 0.4),
        ];
        let esn = EsnTable::from_notes(&notes);
        let detected = [RawNote::new(60, 0.0, 0.1 + 0.2 + 0.3)];

        let esn = fuse_detection(esn, &detected, Technique::Bend, 3);

        assert_eq!(esn.len(), 2);
        assert_eq!(esn.rows()[1].pitch, 63);
    }

    #[test]
    fn test_fuse_walk_off_end_still_tags() {
        let esn = table(&[(0.0, 1.0), (1.0, 2.0)]);

        let esn = fuse_detection(esn, &[RawNote::new(60, 0.0, 3.0)], Technique::Vibrato, 2);

        assert_eq!(spans(&esn), vec![(0.0, 3.0)]);
        assert_eq!(esn.rows()[0].vibrato, 2);
    }

    #[test]
    fn test_fuse_batched_deletion_keeps_later_matches() {
        let esn = table(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 4.0)]);
        let detected = [RawNote::new(60, 0.0, 2.0), RawNote::new(62, 2.0, 2.0)];

        let esn = fuse_detection(esn, &detected, Technique::Vibrato, 2);

        assert_eq!(spans(&esn), vec![(0.0, 2.0), (2.0, 4.0)]);
        assert!(esn.rows().iter().all(|r| r.vibrato == 2));
    }

    #[test]
    fn test_register_detection_updates_both_tables() {
        let esn = table(&[(0.0, 1.0), (1.0, 2.0)]);
        let detected = [RawNote::new(60, 0.0, 1.0)];

        let (esn, ts) = register_detection(esn, TsList::new(), &detected, Technique::Vibrato, 1);

        assert_eq!(esn.rows()[0].vibrato, 1);
        assert_eq!(ts.len(), 1);
        assert_eq!(ts.segments()[0].technique, Technique::Vibrato);
    }
}
