//! Worker pool dispatcher and result aggregation.
//!
//! Every descriptor becomes one job on a fixed-size rayon pool. Workers
//! write into a shared [`ResultAggregator`]; the summary can only be taken
//! by consuming the aggregator, which happens after the pool has drained.

use crate::config::Config;
use crate::hosting::RepositoryDescriptor;
use crate::sync::{SyncCallbacks, SyncResult, SyncTarget, VersionControlClient, sync_repository};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Concurrency-safe map from repository name to its result.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    entries: Mutex<BTreeMap<String, SyncResult>>,
}

impl ResultAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `result`, replacing an earlier entry of the same name.
    pub fn record(&self, result: SyncResult) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.entry(result.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
            Entry::Occupied(mut slot) => {
                warn!(repo = %result.name, "repository reported twice, keeping the latest result");
                slot.insert(result);
            }
        }
    }

    /// Final view; consumes the aggregator so no worker can still write.
    #[must_use]
    pub fn into_summary(self) -> SyncSummary {
        SyncSummary {
            entries: self
                .entries
                .into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        }
    }
}

/// Results of one run keyed by repository name, iterated in name order.
#[derive(Debug, Default)]
pub struct SyncSummary {
    entries: BTreeMap<String, SyncResult>,
}

impl SyncSummary {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SyncResult> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncResult> {
        self.entries.values()
    }

    /// `name -> branch` for every entry that has one.
    #[must_use]
    pub fn branches(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .filter_map(|(name, result)| result.branch().map(|b| (name.as_str(), b)))
            .collect()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.iter().filter(|r| !r.is_success()).count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.iter().filter(|r| r.has_warnings()).count()
    }
}

/// Syncs every descriptor on a pool of `config.workers` threads and blocks
/// until all of them are done.
pub fn run_all<V, C, F>(
    descriptors: &[RepositoryDescriptor],
    target: &SyncTarget<'_>,
    client: &V,
    make_callbacks: F,
    config: &Config,
) -> SyncSummary
where
    V: VersionControlClient + ?Sized,
    C: SyncCallbacks,
    F: Fn(&RepositoryDescriptor) -> C + Sync,
{
    let aggregator = ResultAggregator::new();
    let workers = config.workers.max(1);

    let job = |descriptor: &RepositoryDescriptor| {
        let callbacks = make_callbacks(descriptor);
        aggregator.record(sync_repository(descriptor, target, client, &callbacks));
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("sync-worker-{i}"))
        .build()
    {
        Ok(pool) => {
            debug!(workers, jobs = descriptors.len(), "dispatching");
            pool.install(|| descriptors.par_iter().for_each(job));
        }
        Err(e) => {
            warn!(error = %e, "could not build worker pool, syncing sequentially");
            descriptors.iter().for_each(job);
        }
    }

    aggregator.into_summary()
}
