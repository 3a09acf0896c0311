//! Parallel scan dispatch and flow-table merging.
//!
//! Each file is scanned by its own blocking task with a private flow table.
//! Finished results are consumed one at a time, in completion order, by a
//! single [`FlowAggregator`], which is the only place global totals change.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use flows_core::error::{FlowError, Result};
use flows_core::models::{
    merge_flow_counts, FileFailure, FilePartialResult, FlowCounts, GlobalResult, ScanCounters,
};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{info, warn};

use crate::scanner::{find_log_files, scan_file};

// ── ScanOptions ───────────────────────────────────────────────────────────────

/// Tuning knobs for [`run`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Upper bound on concurrently scanned files; `None` uses the CPU count.
    pub max_workers: Option<usize>,
}

/// Pool size for `file_count` files: the CPU count (or `max_workers`),
/// capped by the number of files, and never below one.
pub fn worker_count(file_count: usize, max_workers: Option<usize>) -> usize {
    let limit = max_workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    });
    limit.min(file_count).max(1)
}

// ── FlowAggregator ────────────────────────────────────────────────────────────

/// Single-writer reduction of per-file results.
///
/// Merging is summation, so the final state does not depend on the order in
/// which results are absorbed.
#[derive(Debug, Clone, Default)]
pub struct FlowAggregator {
    counters: ScanCounters,
    flows: FlowCounts,
    files_scanned: usize,
    failures: Vec<FileFailure>,
}

impl FlowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one file's counters and flow table into the totals.
    pub fn absorb(&mut self, partial: FilePartialResult) {
        self.counters.add(&partial.counters);
        merge_flow_counts(&mut self.flows, partial.flows);
        self.files_scanned += 1;
    }

    /// Note a file that contributes nothing.
    pub fn record_failure(&mut self, path: &Path, error: &FlowError) {
        self.failures.push(FileFailure {
            path: path.display().to_string(),
            error: error.to_string(),
        });
    }

    pub fn counters(&self) -> &ScanCounters {
        &self.counters
    }

    pub fn flows(&self) -> &FlowCounts {
        &self.flows
    }

    /// Seal the totals into a [`GlobalResult`].
    pub fn finish(mut self, started_at: DateTime<Utc>, elapsed: Duration) -> GlobalResult {
        self.failures.sort_by(|a, b| a.path.cmp(&b.path));
        GlobalResult {
            counters: self.counters,
            flows: self.flows,
            files_scanned: self.files_scanned,
            failures: self.failures,
            started_at,
            finished_at: Utc::now(),
            elapsed,
        }
    }
}

/// Merge any number of partial results.
pub fn merge_partials<I>(partials: I) -> FlowAggregator
where
    I: IntoIterator<Item = FilePartialResult>,
{
    partials
        .into_iter()
        .fold(FlowAggregator::new(), |mut aggregator, partial| {
            aggregator.absorb(partial);
            aggregator
        })
}

// ── run ───────────────────────────────────────────────────────────────────────

/// Scan every eligible file under `source_dir` and merge the results.
///
/// Only a missing or unlistable `source_dir` (or invalid options) fails the
/// run; unreadable files are reported in [`GlobalResult::failures`].
pub async fn run(source_dir: &Path, options: &ScanOptions) -> Result<GlobalResult> {
    if options.max_workers == Some(0) {
        return Err(FlowError::Config("max_workers must be at least 1".to_string()));
    }

    let started_at = Utc::now();
    let clock = Instant::now();

    let files = find_log_files(source_dir)?;
    let workers = worker_count(files.len(), options.max_workers);
    info!(
        source = %source_dir.display(),
        files = files.len(),
        workers,
        "Starting session-close scan"
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = ScanTasks::new();
    let mut task_paths: HashMap<Id, PathBuf> = HashMap::with_capacity(files.len());

    for path in files {
        let semaphore = semaphore.clone();
        let task_path = path.clone();
        let handle = tasks.spawn(async move { scan_with_permit(&semaphore, task_path).await });
        task_paths.insert(handle.id(), path);
    }

    let aggregator = collect_results(tasks, task_paths).await;
    let result = aggregator.finish(started_at, clock.elapsed());
    info!(
        lines = result.counters.lines_seen,
        session_close = result.counters.session_close_lines,
        parsed = result.counters.parsed_lines,
        flows = result.flows.len(),
        failed_files = result.failures.len(),
        elapsed_secs = result.elapsed.as_secs_f64(),
        "Scan finished"
    );
    Ok(result)
}

type ScanTasks = JoinSet<Result<FilePartialResult>>;

/// Drain `tasks` in completion order into one aggregator.
///
/// `task_paths` maps each task to its file so a task that dies still names
/// the file it was scanning.
async fn collect_results(
    mut tasks: ScanTasks,
    mut task_paths: HashMap<Id, PathBuf>,
) -> FlowAggregator {
    let mut aggregator = FlowAggregator::new();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(join_err) => (
                join_err.id(),
                Err(FlowError::Worker(format!("Scan task failed: {join_err}"))),
            ),
        };
        let path = task_paths.remove(&id).unwrap_or_default();

        match outcome {
            Ok(partial) => aggregator.absorb(partial),
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                aggregator.record_failure(&path, &err);
            }
        }
    }
    aggregator
}

/// Wait for a pool slot, then scan `path` on the blocking thread pool.
async fn scan_with_permit(semaphore: &Arc<Semaphore>, path: PathBuf) -> Result<FilePartialResult> {
    let _permit = semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| FlowError::Worker(format!("Worker pool closed: {e}")))?;

    tokio::task::spawn_blocking(move || scan_file(&path))
        .await
        .map_err(|e| FlowError::Worker(format!("Scan task panicked: {e}")))?
}

// ── Tests ─────────────────────────────────────────────────────────────────────
