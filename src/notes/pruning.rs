// Note pruning
// Final clean-up of the note table: notes too short to be played are dropped

use serde::{Deserialize, Serialize};

use super::algebra::TIME_EPSILON;
use super::types::EsnTable;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotePruningConfig {
    /// Shortest note kept in the output (seconds)
    pub min_duration: f64,
}

impl Default for NotePruningConfig {
    fn default() -> Self {
        NotePruningConfig { min_duration: 0.1 }
    }
}

/// Remove every row shorter than `min_duration`
/// Returns the pruned table and the number of removed rows
pub fn prune_short_notes(mut esn: EsnTable, config: &NotePruningConfig) -> (EsnTable, usize) {
    let deleted: Vec<bool> = esn
        .rows()
        .iter()
        .map(|row| row.duration < config.min_duration - TIME_EPSILON)
        .collect();
    let removed = deleted.iter().filter(|d| **d).count();

    if removed > 0 {
        log::debug!(
            "Pruned {} notes shorter than {:.3}s",
            removed,
            config.min_duration
        );
    }

    esn.compact(&deleted);
    (esn, removed)
}
