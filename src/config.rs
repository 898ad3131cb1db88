// Recognizer configuration
// Thresholds of every stage and the label spaces, loadable from JSON

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::audio::SpectralFeatureConfig;
use crate::classify::LabelConfig;
use crate::contour::{CadConfig, VibratoConfig};
use crate::detectors::{LongSlideConfig, SlowBendConfig, WildVibratoConfig};
use crate::notes::NotePruningConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or an invalid label space
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration of the whole recognition pipeline
///
/// Every section falls back to its defaults when absent from the JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub wild_vibrato: WildVibratoConfig,
    pub long_slide: LongSlideConfig,
    pub cad: CadConfig,
    pub slow_bend: SlowBendConfig,
    pub vibrato: VibratoConfig,
    pub features: SpectralFeatureConfig,
    pub labels: LabelConfig,
    pub pruning: NotePruningConfig,
}

impl RecognizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RecognizerConfig = serde_json::from_str(json)?;
        log::debug!(
            "Loaded recognizer config ({} canonical labels)",
            config.labels.canonical.len()
        );
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{CandidateLabel, Deployment};
    use crate::contour::Direction;
    use tempfile::TempDir;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = RecognizerConfig::from_json_str("{}").unwrap();

        assert_eq!(config.wild_vibrato.min_run_notes, 5);
        assert_eq!(config.cad.min_pitch_difference, 0.8);
        assert_eq!(config.labels.canonical.len(), 5);
        assert_eq!(config.pruning.min_duration, 0.1);
        assert!(matches!(config.labels.deployment, Deployment::Single { .. }));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = RecognizerConfig::from_json_str(r#"{ "cad": { "min_lasting_duration": 0.1 } }"#).unwrap();

        assert_eq!(config.cad.min_lasting_duration, 0.1);
        assert_eq!(config.cad.max_pitch_difference, 3.8);
    }

    #[test]
    fn test_double_deployment_from_json() {
        let json = r#"{
            "labels": {
                "deployment": {
                    "mode": "double",
                    "ascending": { "bend": 0, "hamm": 1, "normal": 2, "slide": 3 },
                    "descending": { "bend": 0, "normal": 1, "pull": 2, "slide": 3 }
                }
            }
        }"#;

        let config = RecognizerConfig::from_json_str(json).unwrap();
        let descending = config.labels.deployment.model_space(Direction::Descending);

        assert_eq!(descending.label(2), Some(CandidateLabel::Pull));
        assert!(descending.is_release_only());
    }

    #[test]
    fn test_invalid_label_space_rejected() {
        let duplicate_id = r#"{ "labels": { "canonical": { "bend": 0, "pull": 0 } } }"#;
        let unknown = r#"{ "labels": { "canonical": { "tap": 0 } } }"#;

        assert!(matches!(RecognizerConfig::from_json_str(duplicate_id), Err(ConfigError::Json(_))));
        assert!(matches!(RecognizerConfig::from_json_str(unknown), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_config_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fretwise.json");
        let mut config = RecognizerConfig::default();
        config.slow_bend.max_pitch_difference = 2;
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();

        let loaded = RecognizerConfig::from_json_file(&path).unwrap();

        assert_eq!(loaded.slow_bend.max_pitch_difference, 2);
        assert!(matches!(
            RecognizerConfig::from_json_file(temp_dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
