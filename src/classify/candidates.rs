// Transition candidates
// Candidate windows from short CAD patterns, classifier results and their canonical verdicts

use serde::{Deserialize, Serialize};

use super::backend::ClassifierError;
use super::labels::{CandidateLabel, LabelSpace};
use crate::contour::CadPattern;
use crate::notes::{Interval, RawNote};

/// Candidate windows: short patterns starting in note `i` and ending in note `i + 1`
pub fn select_candidates(notes: &[RawNote], patterns: &[CadPattern]) -> Vec<Interval> {
    patterns
        .iter()
        .filter(|pattern| {
            notes
                .windows(2)
                .any(|pair| pair[0].contains(pattern.start) && pair[1].contains(pattern.end))
        })
        .map(CadPattern::interval)
        .collect()
}

/// A candidate window with the label id its model predicted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCandidate {
    pub start: f64,
    pub end: f64,
    pub label: u32,
}

impl ClassifiedCandidate {
    pub fn new(start: f64, end: f64, label: u32) -> Self {
        ClassifiedCandidate { start, end, label }
    }

    /// Pair candidate windows with their predicted labels
    pub fn from_windows(windows: &[Interval], labels: &[u32]) -> Result<Vec<Self>, ClassifierError> {
        if windows.len() != labels.len() {
            return Err(ClassifierError::CountMismatch {
                what: "labels",
                expected: windows.len(),
                actual: labels.len(),
            });
        }
        Ok(windows
            .iter()
            .zip(labels)
            .map(|(window, label)| Self::new(window.start, window.end, *label))
            .collect())
    }

    /// Read a flat `[start, end, label, start, end, label, ...]` result
    /// A single triple is one row; an empty slice is no rows
    pub fn rows_from_flat(values: &[f64]) -> Result<Vec<Self>, ClassifierError> {
        if values.len() % 3 != 0 {
            return Err(ClassifierError::MalformedResult(values.len()));
        }
        values
            .chunks_exact(3)
            .map(|row| {
                let label = row[2];
                if label < 0.0 || label.fract() != 0.0 || label > u32::MAX as f64 {
                    return Err(ClassifierError::ClassificationError(format!(
                        "label {} is not a class id",
                        label
                    )));
                }
                Ok(Self::new(row[0], row[1], label as u32))
            })
            .collect()
    }
}

/// A classified candidate resolved to a canonical label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateVerdict {
    pub start: f64,
    pub end: f64,
    pub label: CandidateLabel,
}

impl CandidateVerdict {
    /// True if the verdict starts strictly inside `first` and ends strictly inside `second`
    pub fn spans(&self, first: &RawNote, second: &RawNote) -> bool {
        first.strictly_contains(self.start) && second.strictly_contains(self.end)
    }
}

/// Translate model-space candidates into canonical verdicts
/// Ids unknown to either space are dropped
pub fn translate_candidates(
    candidates: &[ClassifiedCandidate],
    model: &LabelSpace,
    canonical: &LabelSpace,
) -> Vec<CandidateVerdict> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let label = model
                .translate(candidate.label, canonical)
                .and_then(|id| canonical.label(id));
            if label.is_none() {
                log::debug!(
                    "Dropping candidate at {:.3}s: label {} has no canonical counterpart",
                    candidate.start,
                    candidate.label
                );
            }
            label.map(|label| CandidateVerdict {
                start: candidate.start,
                end: candidate.end,
                label,
            })
        })
        .collect()
}
