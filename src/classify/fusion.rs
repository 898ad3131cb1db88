// Classifier-result fusion
// Merges classified transitions into the note table: bend chains first, then
// pull-off, hammer-on and slide markers

use serde::{Deserialize, Serialize};

use super::backend::ClassifierError;
use super::candidates::{translate_candidates, CandidateVerdict, ClassifiedCandidate};
use super::labels::{CandidateLabel, LabelConfig, LabelSpace};
use crate::contour::Direction;
use crate::notes::{EsnTable, ExpressionStyleNote, Technique, TimeSegment, TsList};

/// Largest bend or release magnitude in semitones
pub const MAX_BEND: u8 = 3;

/// Transition marker on the first note of a pair
pub const TRANSITION_START: u8 = 1;

/// Transition marker on the second note of a pair
pub const TRANSITION_STOP: u8 = 2;

/// Append every technique-bearing verdict of one model to the TS list
pub fn log_verdicts(mut ts: TsList, candidates: &[ClassifiedCandidate], model: &LabelSpace) -> TsList {
    ts.extend(candidates.iter().filter_map(|candidate| {
        let technique = model
            .label(candidate.label)
            .and_then(|label| model.verdict_technique(label))?;
        Some(TimeSegment {
            start: candidate.start,
            end: candidate.end,
            technique,
        })
    }));
    ts
}

fn next_live(deleted: &[bool], index: usize) -> Option<usize> {
    (index + 1..deleted.len()).find(|next| !deleted[*next])
}

/// Merge notes joined by chains of bend verdicts
///
/// A bend verdict spanning live notes `i` and `j` (the next live note) anchors a
/// chain, which grows while the following verdict is also a bend spanning the
/// chain's last note and its successor. The chain collapses into note `i`:
/// it reaches the last note's offset, keeps the lowest pitch, takes the
/// column-wise maximum of the orthogonal techniques and accumulates rising
/// steps into bend and falling steps into release. Chained verdicts are
/// consumed. `verdicts` must be sorted by start.
pub fn merge_bend_chains(mut esn: EsnTable, verdicts: &[CandidateVerdict]) -> EsnTable {
    let mut deleted = vec![false; esn.len()];
    let mut consumed = vec![false; verdicts.len()];
    let mut chains = 0;

    for anchor_verdict in 0..verdicts.len() {
        if consumed[anchor_verdict] || verdicts[anchor_verdict].label != CandidateLabel::Bend {
            continue;
        }

        let rows = esn.rows();
        let anchor = (0..rows.len()).filter(|i| !deleted[*i]).find_map(|i| {
            let next = next_live(&deleted, i)?;
            verdicts[anchor_verdict]
                .spans(&rows[i].note(), &rows[next].note())
                .then_some((i, next))
        });
        let Some((first, second)) = anchor else {
            continue;
        };

        let mut chain = vec![first, second];
        let mut last_verdict = anchor_verdict;
        while let Some(verdict) = verdicts.get(last_verdict + 1) {
            if consumed[last_verdict + 1] || verdict.label != CandidateLabel::Bend {
                break;
            }
            let current = chain[chain.len() - 1];
            let Some(next) = next_live(&deleted, current) else {
                break;
            };
            if !verdict.spans(&rows[current].note(), &rows[next].note()) {
                break;
            }
            chain.push(next);
            last_verdict += 1;
        }

        let merged = collapse_chain(&chain.iter().map(|i| rows[*i]).collect::<Vec<_>>());
        esn.rows_mut()[first] = merged;
        for index in &chain[1..] {
            deleted[*index] = true;
        }
        consumed[anchor_verdict..=last_verdict].fill(true);
        chains += 1;
    }

    if chains > 0 {
        log::debug!(
            "Merged {} bend chains, removed {} notes",
            chains,
            deleted.iter().filter(|d| **d).count()
        );
    }

    esn.compact(&deleted);
    esn
}

/// Collapse chained rows (anchor first) into one row
fn collapse_chain(chain: &[ExpressionStyleNote]) -> ExpressionStyleNote {
    let mut merged = chain[0];
    let last = chain[chain.len() - 1];
    merged.duration = last.offset() - merged.onset;

    for technique in Technique::ORTHOGONAL {
        *merged.technique_mut(technique) = chain
            .iter()
            .map(|row| row.technique(technique))
            .max()
            .unwrap_or(0);
    }

    let mut bend = u32::from(merged.bend);
    let mut release = u32::from(merged.release);
    for pair in chain.windows(2) {
        let step = pair[1].pitch - pair[0].pitch;
        if step > 0 {
            bend += step.unsigned_abs();
        } else {
            release += step.unsigned_abs();
        }
    }
    merged.bend = bend.min(u32::from(MAX_BEND)) as u8;
    merged.release = release.min(u32::from(MAX_BEND)) as u8;
    if merged.bend == 0 && merged.release != 0 {
        merged.pre_bend = merged.release;
    }

    merged.pitch = chain.iter().map(|row| row.pitch).min().unwrap_or(merged.pitch);
    merged
}

fn transition_technique(label: CandidateLabel) -> Option<Technique> {
    match label {
        CandidateLabel::Pull => Some(Technique::Pull),
        CandidateLabel::Hammer => Some(Technique::Hammer),
        CandidateLabel::Slide => Some(Technique::Slide),
        CandidateLabel::Bend | CandidateLabel::Normal => None,
    }
}

/// Mark pull-off, hammer-on and slide verdicts on the note pair they span
///
/// An unmarked pair becomes start/stop; a pair whose first note already
/// carries the marker (the stop of a previous transition) gets a stop on its
/// second note. Existing markers are never overwritten.
pub fn tag_transitions(mut esn: EsnTable, verdicts: &[CandidateVerdict]) -> EsnTable {
    let mut tagged = 0;

    for verdict in verdicts {
        let Some(technique) = transition_technique(verdict.label) else {
            continue;
        };

        let rows = esn.rows_mut();
        let Some(first) = (0..rows.len().saturating_sub(1))
            .find(|i| verdict.spans(&rows[*i].note(), &rows[*i + 1].note()))
        else {
            continue;
        };

        let current = rows[first].technique(technique);
        let next = rows[first + 1].technique(technique);
        if next != 0 {
            continue;
        }
        if current == 0 {
            *rows[first].technique_mut(technique) = TRANSITION_START;
        }
        *rows[first + 1].technique_mut(technique) = TRANSITION_STOP;
        tagged += 1;
    }

    log::debug!("Tagged {} transitions", tagged);
    esn
}

/// Counts reported by classification fusion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionSummary {
    /// Candidates whose verdicts were logged in the TS list
    pub logged: usize,

    /// Verdicts resolved in the canonical label space
    pub verdicts: usize,

    /// Notes removed by bend chain merging
    pub merged_notes: usize,
}

/// Fuse the classified candidates of both directions into the tables
pub fn fuse_classification(
    esn: EsnTable,
    ts: TsList,
    ascending: &[ClassifiedCandidate],
    descending: &[ClassifiedCandidate],
    labels: &LabelConfig,
) -> (EsnTable, TsList, FusionSummary) {
    let before = ts.len();
    let mut verdicts = Vec::with_capacity(ascending.len() + descending.len());
    let mut ts = ts;

    for (direction, candidates) in [(Direction::Ascending, ascending), (Direction::Descending, descending)] {
        let model = labels.deployment.model_space(direction);
        ts = log_verdicts(ts, candidates, model);
        verdicts.extend(translate_candidates(candidates, model, &labels.canonical));
    }
    verdicts.sort_by(|a, b| a.start.total_cmp(&b.start));

    let rows_before = esn.len();
    let esn = merge_bend_chains(esn, &verdicts);
    let merged_notes = rows_before - esn.len();
    let esn = tag_transitions(esn, &verdicts);

    let summary = FusionSummary {
        logged: ts.len() - before,
        verdicts: verdicts.len(),
        merged_notes,
    };
    (esn, ts, summary)
}

/// Fuse classifier results given as flat `[start, end, label, ...]` arrays
pub fn fuse_flat_results(
    esn: EsnTable,
    ts: TsList,
    ascending: &[f64],
    descending: &[f64],
    labels: &LabelConfig,
) -> Result<(EsnTable, TsList, FusionSummary), ClassifierError> {
    let ascending = ClassifiedCandidate::rows_from_flat(ascending)?;
    let descending = ClassifiedCandidate::rows_from_flat(descending)?;
    Ok(fuse_classification(esn, ts, &ascending, &descending, labels))
}
