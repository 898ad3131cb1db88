// Classifier label spaces
// Bidirectional label <-> id maps for each deployed model and the canonical space

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::contour::Direction;
use crate::notes::Technique;

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("Unknown label name: {0}")]
    UnknownLabel(String),

    #[error("Label {0} appears more than once")]
    DuplicateLabel(&'static str),

    #[error("Id {id} is used by both {first} and {second}")]
    DuplicateId {
        id: u32,
        first: &'static str,
        second: &'static str,
    },

    #[error("Label space is empty")]
    Empty,
}

/// Class of a note transition as predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateLabel {
    Bend,
    Hammer,
    Normal,
    Pull,
    Slide,
}

impl CandidateLabel {
    /// Name used in label space files
    pub fn name(&self) -> &'static str {
        match self {
            CandidateLabel::Bend => "bend",
            CandidateLabel::Hammer => "hamm",
            CandidateLabel::Normal => "normal",
            CandidateLabel::Pull => "pull",
            CandidateLabel::Slide => "slide",
        }
    }

    /// Accepts the short and the long hammer-on name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bend" => Some(CandidateLabel::Bend),
            "hamm" | "hammer" => Some(CandidateLabel::Hammer),
            "normal" => Some(CandidateLabel::Normal),
            "pull" => Some(CandidateLabel::Pull),
            "slide" => Some(CandidateLabel::Slide),
            _ => None,
        }
    }
}

/// Validated one-to-one map between labels and model output ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct LabelSpace {
    by_id: BTreeMap<u32, CandidateLabel>,
    by_label: BTreeMap<CandidateLabel, u32>,
}

impl LabelSpace {
    pub fn new(pairs: impl IntoIterator<Item = (CandidateLabel, u32)>) -> Result<Self, LabelError> {
        let mut by_id = BTreeMap::new();
        let mut by_label = BTreeMap::new();

        for (label, id) in pairs {
            if by_label.insert(label, id).is_some() {
                return Err(LabelError::DuplicateLabel(label.name()));
            }
            if let Some(first) = by_id.insert(id, label) {
                return Err(LabelError::DuplicateId {
                    id,
                    first: first.name(),
                    second: label.name(),
                });
            }
        }

        if by_id.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(LabelSpace { by_id, by_label })
    }

    /// Build from label names, e.g. `{"bend": 0, "hamm": 1}`
    pub fn from_names<'a>(names: impl IntoIterator<Item = (&'a str, u32)>) -> Result<Self, LabelError> {
        let pairs = names
            .into_iter()
            .map(|(name, id)| {
                CandidateLabel::from_name(name)
                    .map(|label| (label, id))
                    .ok_or_else(|| LabelError::UnknownLabel(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pairs)
    }

    /// `{bend:0, hamm:1, normal:2, pull:3, slide:4}`
    pub fn canonical() -> Self {
        Self::from_static(&[
            (CandidateLabel::Bend, 0),
            (CandidateLabel::Hammer, 1),
            (CandidateLabel::Normal, 2),
            (CandidateLabel::Pull, 3),
            (CandidateLabel::Slide, 4),
        ])
    }

    /// Default space of the ascending model in a two-model deployment
    pub fn ascending() -> Self {
        Self::from_static(&[
            (CandidateLabel::Bend, 0),
            (CandidateLabel::Hammer, 1),
            (CandidateLabel::Normal, 2),
            (CandidateLabel::Slide, 3),
        ])
    }

    /// Default space of the descending model in a two-model deployment
    pub fn descending() -> Self {
        Self::from_static(&[
            (CandidateLabel::Bend, 0),
            (CandidateLabel::Normal, 1),
            (CandidateLabel::Pull, 2),
            (CandidateLabel::Slide, 3),
        ])
    }

    fn from_static(pairs: &[(CandidateLabel, u32)]) -> Self {
        LabelSpace {
            by_id: pairs.iter().map(|(label, id)| (*id, *label)).collect(),
            by_label: pairs.iter().copied().collect(),
        }
    }

    pub fn label(&self, id: u32) -> Option<CandidateLabel> {
        self.by_id.get(&id).copied()
    }

    pub fn id(&self, label: CandidateLabel) -> Option<u32> {
        self.by_label.get(&label).copied()
    }

    pub fn contains(&self, label: CandidateLabel) -> bool {
        self.by_label.contains_key(&label)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// A descending-only model: it can predict pull-offs but not hammer-ons,
    /// so its "bend" class is really a release
    pub fn is_release_only(&self) -> bool {
        self.contains(CandidateLabel::Pull) && !self.contains(CandidateLabel::Hammer)
    }

    /// Map an id of this space to the id of the same label in `target`
    pub fn translate(&self, id: u32, target: &LabelSpace) -> Option<u32> {
        self.label(id).and_then(|label| target.id(label))
    }

    /// Technique logged for a verdict of this model, if any
    pub fn verdict_technique(&self, label: CandidateLabel) -> Option<Technique> {
        match label {
            CandidateLabel::Bend if self.is_release_only() => Some(Technique::Release),
            CandidateLabel::Bend => Some(Technique::Bend),
            CandidateLabel::Hammer => Some(Technique::Hammer),
            CandidateLabel::Pull => Some(Technique::Pull),
            CandidateLabel::Slide => Some(Technique::Slide),
            CandidateLabel::Normal => None,
        }
    }
}

impl TryFrom<BTreeMap<String, u32>> for LabelSpace {
    type Error = LabelError;

    fn try_from(names: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        Self::from_names(names.iter().map(|(name, id)| (name.as_str(), *id)))
    }
}

impl From<LabelSpace> for BTreeMap<String, u32> {
    fn from(space: LabelSpace) -> Self {
        space
            .by_label
            .into_iter()
            .map(|(label, id)| (label.name().to_string(), id))
            .collect()
    }
}

/// How the transition classifier is deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Deployment {
    /// One model classifies both directions
    Single { model: LabelSpace },

    /// One model per candidate direction
    Double {
        ascending: LabelSpace,
        descending: LabelSpace,
    },
}

impl Deployment {
    pub fn single() -> Self {
        Deployment::Single {
            model: LabelSpace::canonical(),
        }
    }

    pub fn double() -> Self {
        Deployment::Double {
            ascending: LabelSpace::ascending(),
            descending: LabelSpace::descending(),
        }
    }

    /// Label space of the model that classifies `direction` candidates
    pub fn model_space(&self, direction: Direction) -> &LabelSpace {
        match (self, direction) {
            (Deployment::Single { model }, _) => model,
            (Deployment::Double { ascending, .. }, Direction::Ascending) => ascending,
            (Deployment::Double { descending, .. }, Direction::Descending) => descending,
        }
    }
}

/// Label spaces used by classification fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub deployment: Deployment,

    /// Space every verdict is translated into before fusion
    pub canonical: LabelSpace,
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            deployment: Deployment::single(),
            canonical: LabelSpace::canonical(),
        }
    }
}
