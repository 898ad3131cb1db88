// Fretwise - Guitar expression style recognizer
// Module declarations

pub mod audio;
pub mod classify;
pub mod config;
pub mod contour;
pub mod detectors;
pub mod notes;
pub mod pipeline;

pub use config::{ConfigError, RecognizerConfig};
pub use notes::{EsnTable, ExpressionStyleNote, RawNote, Technique, TimeSegment, TsList};
pub use pipeline::{recognize_batch, AudioItem, ItemOutcome, PipelineError, Recognition, Recognizer};
