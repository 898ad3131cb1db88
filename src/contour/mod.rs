// Pitch contour module
// Melody contours, quantization, monotonic (CAD) patterns and vibrato estimation

pub mod cad;
pub mod melody;
pub mod quantize;
pub mod vibrato;

pub use cad::{CadConfig, CadPattern, CadPatternProvider, Direction, MonotonicCadProvider};
pub use melody::Melody;
pub use quantize::{frame_to_notes, quantize, PITCH_BINS};
pub use vibrato::{OscillationVibratoEstimator, VibratoConfig, VibratoEstimate, VibratoEstimator};
