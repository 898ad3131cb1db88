// Classifier backend abstraction
// Feature extraction and transition classification are pluggable collaborators;
// TransitionClassifier chains them with optional feature scaling

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::audio::AudioClip;
use crate::contour::Direction;
use crate::notes::Interval;

/// Errors that can occur during classification
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Classification failed: {0}")]
    ClassificationError(String),

    #[error("Feature extraction failed: {0}")]
    FeatureExtractionError(String),

    #[error("Expected {expected} {what}, got {actual}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Flat classifier result of length {0} is not a list of [start, end, label] triples")]
    MalformedResult(usize),
}

/// Acoustic features of candidate windows
pub trait FeatureExtractor: Send + Sync {
    /// One feature vector per window, in window order
    fn extract(&self, audio: &AudioClip, windows: &[Interval]) -> Result<Vec<Vec<f64>>, ClassifierError>;
}

/// Statistical classifier of candidate transitions
pub trait CandidateClassifier: Send + Sync {
    /// One model-space label id per feature vector
    fn classify(&self, direction: Direction, features: &[Vec<f64>]) -> Result<Vec<u32>, ClassifierError>;
}

/// Per-dimension standardization fitted at training time: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ClassifierError> {
        if mean.len() != scale.len() {
            return Err(ClassifierError::CountMismatch {
                what: "scale values",
                expected: mean.len(),
                actual: scale.len(),
            });
        }
        Ok(StandardScaler { mean, scale })
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ClassifierError> {
        let scaler: StandardScaler =
            serde_json::from_slice(data).map_err(|e| ClassifierError::ModelLoadError(e.to_string()))?;
        Self::new(scaler.mean, scaler.scale)
    }

    /// Scale feature vectors in place; a zero scale leaves the centered value unscaled
    pub fn transform(&self, features: &mut [Vec<f64>]) -> Result<(), ClassifierError> {
        for vector in features.iter_mut() {
            if vector.len() != self.mean.len() {
                return Err(ClassifierError::CountMismatch {
                    what: "feature dimensions",
                    expected: self.mean.len(),
                    actual: vector.len(),
                });
            }
            for ((value, mean), scale) in vector.iter_mut().zip(&self.mean).zip(&self.scale) {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                *value = (*value - mean) / scale;
            }
        }
        Ok(())
    }
}

/// Unified classifier interface: extract, scale and classify candidate windows
#[derive(Clone)]
pub struct TransitionClassifier {
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Arc<dyn CandidateClassifier>,
    ascending_scaler: Option<StandardScaler>,
    descending_scaler: Option<StandardScaler>,
}

impl TransitionClassifier {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, classifier: Arc<dyn CandidateClassifier>) -> Self {
        TransitionClassifier {
            extractor,
            classifier,
            ascending_scaler: None,
            descending_scaler: None,
        }
    }

    /// Use one scaler for both directions (single-model deployment)
    pub fn with_scaler(self, scaler: StandardScaler) -> Self {
        self.with_direction_scaler(Direction::Ascending, scaler.clone())
            .with_direction_scaler(Direction::Descending, scaler)
    }

    pub fn with_direction_scaler(mut self, direction: Direction, scaler: StandardScaler) -> Self {
        match direction {
            Direction::Ascending => self.ascending_scaler = Some(scaler),
            Direction::Descending => self.descending_scaler = Some(scaler),
        }
        self
    }

    fn scaler(&self, direction: Direction) -> Option<&StandardScaler> {
        match direction {
            Direction::Ascending => self.ascending_scaler.as_ref(),
            Direction::Descending => self.descending_scaler.as_ref(),
        }
    }

    /// Classify candidate windows of one direction
    /// Returns one model-space label id per window
    pub fn classify_windows(
        &self,
        direction: Direction,
        audio: &AudioClip,
        windows: &[Interval],
    ) -> Result<Vec<u32>, ClassifierError> {
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let mut features = self.extractor.extract(audio, windows)?;
        if features.len() != windows.len() {
            return Err(ClassifierError::CountMismatch {
                what: "feature vectors",
                expected: windows.len(),
                actual: features.len(),
            });
        }

        if let Some(scaler) = self.scaler(direction) {
            scaler.transform(&mut features)?;
        }

        let labels = self.classifier.classify(direction, &features)?;
        if labels.len() != windows.len() {
            return Err(ClassifierError::CountMismatch {
                what: "labels",
                expected: windows.len(),
                actual: labels.len(),
            });
        }

        log::debug!("Classified {} {} candidates", labels.len(), direction.name());
        Ok(labels)
    }
}

impl std::fmt::Debug for TransitionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionClassifier")
            .field("ascending_scaler", &self.ascending_scaler)
            .field("descending_scaler", &self.descending_scaler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Window length in seconds as the only feature
    struct LengthExtractor;

    impl FeatureExtractor for LengthExtractor {
        fn extract(&self, _audio: &AudioClip, windows: &[Interval]) -> Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(windows.iter().map(|w| vec![w.length()]).collect())
        }
    }

    /// Label 1 for positive features, 0 otherwise
    struct SignClassifier;

    impl CandidateClassifier for SignClassifier {
        fn classify(&self, _direction: Direction, features: &[Vec<f64>]) -> Result<Vec<u32>, ClassifierError> {
            Ok(features.iter().map(|f| u32::from(f[0] > 0.0)).collect())
        }
    }

    struct DroppingClassifier;

    impl CandidateClassifier for DroppingClassifier {
        fn classify(&self, _direction: Direction, _features: &[Vec<f64>]) -> Result<Vec<u32>, ClassifierError> {
            Ok(vec![0])
        }
    }

    fn clip() -> AudioClip {
        AudioClip::new(vec![0.0; 100], 100)
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler::new(vec![1.0, 2.0], vec![2.0, 0.0]).unwrap();
        let mut features = vec![vec![3.0, 5.0]];

        scaler.transform(&mut features).unwrap();

        assert_eq!(features, vec![vec![1.0, 3.0]]);
    }

    #[test]
    fn test_scaler_dimension_mismatch() {
        let scaler = StandardScaler::new(vec![0.0], vec![1.0]).unwrap();
        let mut features = vec![vec![1.0, 2.0]];

        assert!(matches!(
            scaler.transform(&mut features),
            Err(ClassifierError::CountMismatch { expected: 1, actual: 2, .. })
        ));
        assert!(StandardScaler::new(vec![0.0], vec![]).is_err());
    }

    #[test]
    fn test_scaler_from_json() {
        let scaler = StandardScaler::from_json_bytes(br#"{"mean": [0.5], "scale": [2.0]}"#).unwrap();
        assert_eq!(scaler.mean, vec![0.5]);

        assert!(matches!(
            StandardScaler::from_json_bytes(b"{"),
            Err(ClassifierError::ModelLoadError(_))
        ));
    }

    #[test]
    fn test_classify_windows_applies_direction_scaler() {
        let classifier = TransitionClassifier::new(Arc::new(LengthExtractor), Arc::new(SignClassifier))
            .with_direction_scaler(Direction::Descending, StandardScaler::new(vec![0.25], vec![1.0]).unwrap());
        let windows = [Interval::new(0.0, 0.1), Interval::new(0.0, 0.5)];

        let up = classifier.classify_windows(Direction::Ascending, &clip(), &windows).unwrap();
        let down = classifier.classify_windows(Direction::Descending, &clip(), &windows).unwrap();

        assert_eq!(up, vec![1, 1]);
        assert_eq!(down, vec![0, 1]);
    }

    #[test]
    fn test_classify_windows_count_mismatch() {
        let classifier = TransitionClassifier::new(Arc::new(LengthExtractor), Arc::new(DroppingClassifier));
        let windows = [Interval::new(0.0, 0.1), Interval::new(0.2, 0.3)];

        let result = classifier.classify_windows(Direction::Ascending, &clip(), &windows);

        assert!(matches!(
            result,
            Err(ClassifierError::CountMismatch { what: "labels", expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_no_windows_skips_collaborators() {
        let classifier = TransitionClassifier::new(Arc::new(LengthExtractor), Arc::new(DroppingClassifier));
        assert!(classifier
            .classify_windows(Direction::Ascending, &clip(), &[])
            .unwrap()
            .is_empty());
    }
}
