// Pipeline execution and monitoring module
// Drives the recognition stages per item, batches items and traces the runs

pub mod batch;
pub mod recognizer;
pub mod trace;

pub use batch::{recognize_batch, ItemOutcome};
pub use recognizer::{AudioItem, PipelineError, Recognition, Recognizer, StageCounts};
pub use trace::{read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter};
