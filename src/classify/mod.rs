// Transition classification module
// Candidate selection, classifier backends, label spaces and fusion of the verdicts

pub mod backend;
pub mod candidates;
pub mod fusion;
pub mod knn;
pub mod labels;

pub use backend::{CandidateClassifier, ClassifierError, FeatureExtractor, StandardScaler, TransitionClassifier};
pub use candidates::{select_candidates, translate_candidates, CandidateVerdict, ClassifiedCandidate};
pub use fusion::{fuse_classification, fuse_flat_results, log_verdicts, merge_bend_chains, tag_transitions, FusionSummary};
pub use knn::{KnnCandidateClassifier, LabeledFeatures, TrainingSet};
pub use labels::{CandidateLabel, Deployment, LabelConfig, LabelError, LabelSpace};
