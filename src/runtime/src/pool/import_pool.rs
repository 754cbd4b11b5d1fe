//! Bounded fan-out of image imports.
//!
//! A pre-filled, closed queue of references is drained by at most
//! `min(4, CPUs, N)` workers. Each worker collects its own outcomes; the
//! pool merges them after every worker has finished.

use std::collections::HashMap;
use std::sync::Arc;

use secure_import_core::report::ImportOutcome;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::oci::ImageReference;
use crate::pipeline::ImportPipeline;

/// Upper bound on concurrent pipelines.
pub const MAX_WORKERS: usize = 4;

/// Number of workers for `jobs` images: `min(limit, CPUs, jobs)`.
pub fn worker_count(limit: usize, jobs: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    limit.min(cpus).min(jobs)
}

/// Runs the import pipeline over many images with bounded parallelism.
pub struct ImportPool {
    pipeline: ImportPipeline,
    max_workers: usize,
}

impl ImportPool {
    pub fn new(pipeline: ImportPipeline) -> Self {
        Self {
            pipeline,
            max_workers: MAX_WORKERS,
        }
    }

    /// Lower the worker limit (values below one are treated as one).
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Import every reference, returning exactly one outcome per reference.
    ///
    /// Outcomes arrive in completion order. A failed image becomes a
    /// `Failed` outcome and never stops the other workers.
    pub async fn run(&self, references: Vec<ImageReference>) -> Vec<ImportOutcome> {
        let total = references.len();
        let workers = worker_count(self.max_workers, total);
        if workers == 0 {
            return Vec::new();
        }

        let names: Vec<String> = references.iter().map(ToString::to_string).collect();

        let (tx, rx) = mpsc::unbounded_channel();
        for reference in references {
            if tx.send(reference).is_err() {
                break;
            }
        }
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));

        tracing::info!(
            images = total,
            workers,
            target = %self.pipeline.target_registry(),
            "Starting image import"
        );

        let mut set = JoinSet::new();
        for id in 1..=workers {
            let queue = Arc::clone(&queue);
            let pipeline = self.pipeline.clone();
            set.spawn(
                async move {
                    let mut outcomes = Vec::new();
                    loop {
                        let next = queue.lock().await.recv().await;
                        let Some(reference) = next else {
                            break;
                        };
                        outcomes.push(import_one(&pipeline, &reference).await);
                    }
                    tracing::debug!(processed = outcomes.len(), "Worker finished");
                    outcomes
                }
                .instrument(tracing::info_span!("worker", id)),
            );
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(batch) => outcomes.extend(batch),
                Err(e) => tracing::error!(error = %e, "Import worker terminated abnormally"),
            }
        }

        fill_missing(&names, &mut outcomes);
        outcomes
    }
}

async fn import_one(pipeline: &ImportPipeline, reference: &ImageReference) -> ImportOutcome {
    match pipeline.run(reference).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(reference = %reference, error = %e, "Image import failed");
            ImportOutcome::failed(reference.to_string(), e)
        }
    }
}

/// Record a failure for every reference a crashed worker never reported.
fn fill_missing(names: &[String], outcomes: &mut Vec<ImportOutcome>) {
    let mut reported: HashMap<&str, usize> = HashMap::new();
    for outcome in outcomes.iter() {
        *reported.entry(outcome.name.as_str()).or_default() += 1;
    }

    let mut missing = Vec::new();
    for name in names {
        match reported.get_mut(name.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(ImportOutcome::failed(
                name.clone(),
                "import worker terminated before reporting",
            )),
        }
    }
    outcomes.extend(missing);
}
