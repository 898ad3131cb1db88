// Soft vibrato detection
// Runs the vibrato estimator over the raw contour of every note not yet tagged

use std::sync::Arc;

use super::StageResult;
use crate::contour::{Melody, VibratoEstimator};
use crate::notes::{register_detection, EsnTable, RawNote, Technique, TsList};

/// Vibrato column value for a mild vibrato
pub const MILD_VIBRATO: u8 = 1;

/// Detects mild vibrato note by note
#[derive(Clone)]
pub struct SoftVibratoDetector {
    estimator: Arc<dyn VibratoEstimator>,
}

impl SoftVibratoDetector {
    pub fn new(estimator: Arc<dyn VibratoEstimator>) -> Self {
        SoftVibratoDetector { estimator }
    }

    pub fn detect(&self, esn: EsnTable, ts: TsList, melody: &Melody) -> StageResult {
        let frame_rate = melody.frame_rate();
        if frame_rate <= 0.0 || melody.raw.is_empty() {
            log::warn!("Soft vibrato skipped: raw contour is empty");
            return StageResult { esn, ts, detected: 0 };
        }

        let mut vibrato: Vec<RawNote> = Vec::new();
        for row in esn.rows().iter().filter(|row| row.vibrato == 0) {
            let onset_frame = melody.seconds_to_frame(row.onset).min(melody.raw.len());
            let offset_frame = melody.seconds_to_frame(row.offset()).min(melody.raw.len());
            if onset_frame >= offset_frame {
                continue;
            }

            let estimate = self
                .estimator
                .estimate(&melody.raw[onset_frame..offset_frame], frame_rate);
            if estimate.has_vibrato() {
                vibrato.push(row.note());
            }
        }

        log::debug!("Soft vibrato: {} of {} notes", vibrato.len(), esn.len());

        let (esn, ts) = register_detection(esn, ts, &vibrato, Technique::Vibrato, MILD_VIBRATO);
        StageResult {
            esn,
            ts,
            detected: vibrato.len(),
        }
    }
}

impl std::fmt::Debug for SoftVibratoDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftVibratoDetector").finish_non_exhaustive()
    }
}
