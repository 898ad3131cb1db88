// Rule-based technique detectors
// Each detector takes the note table and the time-segment log by value and returns them updated

pub mod long_slide;
pub mod slow_bend;
pub mod soft_vibrato;
pub mod wild_vibrato;

use serde::{Deserialize, Serialize};

use crate::notes::{EsnTable, TsList};

pub use long_slide::{find_ladders, project_onto_notes, LongSlideConfig, LongSlideDetector};
pub use slow_bend::{find_long_patterns, SlowBendConfig, SlowBendDetector, SlowBendResult};
pub use soft_vibrato::SoftVibratoDetector;
pub use wild_vibrato::{merge_serrated_runs, SerratedMerge, WildVibratoConfig, WildVibratoDetector};

/// Tables after one detection stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageResult {
    pub esn: EsnTable,
    pub ts: TsList,

    /// Number of detections the stage registered
    pub detected: usize,
}
