// Nearest-neighbour transition classifier
// Labeled feature vectors per candidate direction, matched by k-nearest-neighbour vote

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::backend::{CandidateClassifier, ClassifierError};
use crate::contour::Direction;

/// One labeled training example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledFeatures {
    pub direction: Direction,

    /// Model-space label id
    pub label: u32,

    pub features: Vec<f64>,
}

/// Collection of labeled examples, stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    pub name: String,
    pub samples: Vec<LabeledFeatures>,

    /// Creation timestamp (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl TrainingSet {
    pub fn new(name: impl Into<String>) -> Self {
        TrainingSet {
            name: name.into(),
            samples: Vec::new(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn add_sample(&mut self, direction: Direction, label: u32, features: Vec<f64>) {
        self.samples.push(LabeledFeatures {
            direction,
            label,
            features,
        });
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.samples.iter().filter(|s| s.direction == direction).count()
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// K-nearest-neighbour classifier over a training set
#[derive(Debug, Clone)]
pub struct KnnCandidateClassifier {
    training: TrainingSet,
    k: usize,
}

impl KnnCandidateClassifier {
    pub fn new(training: TrainingSet, k: usize) -> Self {
        KnnCandidateClassifier {
            training,
            k: k.max(1),
        }
    }

    fn vote(&self, direction: Direction, features: &[f64]) -> Result<u32, ClassifierError> {
        let mut distances: Vec<(u32, f64)> = Vec::new();
        for sample in self.training.samples.iter().filter(|s| s.direction == direction) {
            if sample.features.len() != features.len() {
                return Err(ClassifierError::CountMismatch {
                    what: "feature dimensions",
                    expected: sample.features.len(),
                    actual: features.len(),
                });
            }
            let distance = sample
                .features
                .iter()
                .zip(features)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            distances.push((sample.label, distance));
        }

        if distances.is_empty() {
            return Err(ClassifierError::ClassificationError(format!(
                "no {} training samples",
                direction.name()
            )));
        }

        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        // Votes per label, ties broken by the smaller summed distance
        let mut votes: BTreeMap<u32, (usize, f64)> = BTreeMap::new();
        for (label, distance) in distances.iter().take(self.k) {
            let entry = votes.entry(*label).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += distance;
        }

        votes
            .into_iter()
            .max_by(|(_, a), (_, b)| a.0.cmp(&b.0).then(b.1.total_cmp(&a.1)))
            .map(|(label, _)| label)
            .ok_or_else(|| ClassifierError::ClassificationError("no neighbours".to_string()))
    }
}

impl CandidateClassifier for KnnCandidateClassifier {
    fn classify(&self, direction: Direction, features: &[Vec<f64>]) -> Result<Vec<u32>, ClassifierError> {
        features
            .iter()
            .map(|vector| self.vote(direction, vector))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training() -> TrainingSet {
        let mut set = TrainingSet::new("test");
        set.add_sample(Direction::Ascending, 0, vec![0.0, 0.0]);
        set.add_sample(Direction::Ascending, 0, vec![0.1, 0.0]);
        set.add_sample(Direction::Ascending, 1, vec![1.0, 1.0]);
        set.add_sample(Direction::Ascending, 1, vec![0.9, 1.0]);
        set.add_sample(Direction::Descending, 2, vec![0.0, 0.0]);
        set
    }

    #[test]
    fn test_nearest_label_wins() {
        let classifier = KnnCandidateClassifier::new(training(), 3);

        let labels = classifier
            .classify(Direction::Ascending, &[vec![0.05, 0.1], vec![0.95, 0.9]])
            .unwrap();

        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_direction_selects_samples() {
        let classifier = KnnCandidateClassifier::new(training(), 3);

        let labels = classifier.classify(Direction::Descending, &[vec![1.0, 1.0]]).unwrap();

        assert_eq!(labels, vec![2]);
    }

    #[test]
    fn test_tie_goes_to_closer_label() {
        let classifier = KnnCandidateClassifier::new(training(), 2);

        // One neighbour of each label; label 1 is closer
        let labels = classifier.classify(Direction::Ascending, &[vec![0.52, 0.52]]).unwrap();

        assert_eq!(labels, vec![1]);
    }

    #[test]
    fn test_missing_direction_or_dimension_fails() {
        let mut set = TrainingSet::new("ascending only");
        set.add_sample(Direction::Ascending, 0, vec![0.0]);
        let classifier = KnnCandidateClassifier::new(set, 1);

        assert!(classifier.classify(Direction::Descending, &[vec![0.0]]).is_err());
        assert!(classifier.classify(Direction::Ascending, &[vec![0.0, 1.0]]).is_err());
        assert!(classifier.classify(Direction::Descending, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_training_set_json() {
        let set = training();

        let restored = TrainingSet::from_json_bytes(&set.to_json_bytes().unwrap()).unwrap();

        assert_eq!(restored, set);
        assert_eq!(restored.count(Direction::Ascending), 4);
    }
}
