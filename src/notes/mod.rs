// Note module
// Raw notes, the expression-style annotation tables and the interval algebra over them

pub mod algebra;
pub mod pruning;
pub mod types;

pub use algebra::{
    append_time_segment, fuse_detection, note_to_time_segment, register_detection, TIME_EPSILON,
};
pub use pruning::{prune_short_notes, NotePruningConfig};
pub use types::{EsnTable, ExpressionStyleNote, Interval, RawNote, Technique, TimeSegment, TsList};
