// Batch recognition
// Independent items run on the blocking pool, bounded by a worker semaphore

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::recognizer::{AudioItem, PipelineError, Recognition, Recognizer};

/// Outcome of one item of a batch
#[derive(Debug)]
pub struct ItemOutcome {
    pub name: String,
    pub result: Result<Recognition, PipelineError>,
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Recognize all items with at most `max_workers` running at once
///
/// Outcomes are returned in input order. A failing or panicking item only
/// affects its own outcome.
pub async fn recognize_batch(
    recognizer: Arc<Recognizer>,
    items: Vec<AudioItem>,
    max_workers: usize,
) -> Vec<ItemOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let names: Vec<String> = items.iter().map(|item| item.name.clone()).collect();
    log::info!("Recognizing {} items with {} workers", items.len(), max_workers.max(1));

    let mut tasks = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let recognizer = Arc::clone(&recognizer);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (index, Err(PipelineError::Worker(e.to_string()))),
            };

            let result = match tokio::task::spawn_blocking(move || recognizer.recognize(&item)).await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Worker(e.to_string())),
            };
            (index, result)
        });
    }

    let mut results: Vec<Option<Result<Recognition, PipelineError>>> = names.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => log::error!("Batch task failed: {}", e),
        }
    }

    let outcomes: Vec<ItemOutcome> = names
        .into_iter()
        .zip(results)
        .map(|(name, result)| ItemOutcome {
            result: result.unwrap_or_else(|| Err(PipelineError::Worker(format!("no result for '{}'", name)))),
            name,
        })
        .collect();

    let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
    if failed > 0 {
        log::warn!("{} of {} items failed", failed, outcomes.len());
    }
    outcomes
}
