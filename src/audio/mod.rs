// Audio processing module
// WAV ingestion and spectral features of candidate windows

pub mod features;
pub mod ingest;

pub use features::{SpectralFeatureConfig, SpectralFeatureExtractor, FEATURE_COUNT};
pub use ingest::{AudioClip, AudioError};
