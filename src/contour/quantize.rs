// Contour quantization
// Snaps a continuous semitone contour to integer pitch bins and rebuilds notes from it

use crate::notes::RawNote;

/// Number of pitch partitions; quantized values lie in 0..PITCH_BINS
pub const PITCH_BINS: usize = 90;

const HALF_STEP: f64 = 0.5;

/// Quantize a semitone contour to integer bins
///
/// Each sample maps to the last partition boundary `p` with `sample >= p - 0.5`,
/// i.e. the nearest semitone. Unvoiced and negative samples map to 0.
pub fn quantize(contour: &[f64]) -> Vec<i32> {
    contour.iter().map(|&sample| quantize_sample(sample)).collect()
}

fn quantize_sample(sample: f64) -> i32 {
    let mut index = 0;
    while index < PITCH_BINS && sample >= index as f64 - HALF_STEP {
        index += 1;
    }
    (index as i32 - 1).max(0)
}

/// Run-length encode consecutive equal non-zero frames into notes
/// Frame indices become seconds through `hop / sample_rate`
pub fn frame_to_notes(frames: &[i32], hop: usize, sample_rate: u32) -> Vec<RawNote> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let seconds_per_frame = hop as f64 / sample_rate as f64;

    let mut notes = Vec::new();
    let mut start = 0;
    while start < frames.len() {
        let pitch = frames[start];
        let mut end = start + 1;
        while end < frames.len() && frames[end] == pitch {
            end += 1;
        }

        if pitch != 0 {
            notes.push(RawNote::new(
                pitch,
                start as f64 * seconds_per_frame,
                (end - start) as f64 * seconds_per_frame,
            ));
        }
        start = end;
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_rounds_to_nearest_semitone() {
        let contour = [60.2, 59.6, 59.5, 59.49, 0.3, 0.0];
        assert_eq!(quantize(&contour), vec![60, 60, 60, 59, 0, 0]);
    }

    #[test]
    fn test_quantize_clips_range() {
        let contour = [-3.0, 120.0, f64::NAN];
        assert_eq!(quantize(&contour), vec![0, PITCH_BINS as i32 - 1, 0]);
    }

    #[test]
    fn test_frame_to_notes_skips_unvoiced() {
        let frames = [0, 0, 60, 60, 60, 0, 59, 59, 58];

        let notes = frame_to_notes(&frames, 100, 1000);

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].pitch, 60);
        assert!((notes[0].onset - 0.2).abs() < 1e-12);
        assert!((notes[0].duration - 0.3).abs() < 1e-12);
        assert_eq!(notes[1].pitch, 59);
        assert!((notes[1].onset - 0.6).abs() < 1e-12);
        // A single trailing frame still makes a note
        assert_eq!(notes[2].pitch, 58);
        assert!((notes[2].duration - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_frame_to_notes_empty() {
        assert!(frame_to_notes(&[], 256, 44100).is_empty());
        assert!(frame_to_notes(&[0, 0, 0], 256, 44100).is_empty());
    }
}
