//! # Reconciliation Driver
//!
//! Pulls raw events from an [`EventSource`], classifies them, and merges
//! every milestone into the [`ReconciliationStore`]. Unusable events are
//! counted and dropped. A failed merge is logged and dropped; recovery is
//! left to redelivery by the source.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use podlife_core::{classify_detailed, report, Classification, MilestoneEvent, PodUid};
use podlife_store::{ReconciliationStore, RecordBackend};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::DriverConfig;
use crate::source::EventSource;
use crate::stats::{DriverStats, StatsSnapshot};

/// Classify-then-merge loop over a shared store.
#[derive(Debug)]
pub struct ReconciliationDriver<B> {
    store: Arc<ReconciliationStore<B>>,
    config: DriverConfig,
    stats: Arc<DriverStats>,
}

impl<B: RecordBackend> ReconciliationDriver<B> {
    pub fn new(store: Arc<ReconciliationStore<B>>, config: DriverConfig) -> Self {
        Self {
            store,
            config,
            stats: Arc::new(DriverStats::new()),
        }
    }

    pub fn store(&self) -> &Arc<ReconciliationStore<B>> {
        &self.store
    }

    /// Live counters. Cumulative across runs.
    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Consume `source` until it is exhausted.
    pub async fn run<S: EventSource>(&self, source: S) -> StatsSnapshot {
        self.run_until(source, std::future::pending()).await
    }

    /// Consume `source` until it is exhausted or `shutdown` completes,
    /// whichever comes first. Returns once every event already taken from
    /// the source has been merged or dropped.
    pub async fn run_until<S, F>(&self, mut source: S, shutdown: F) -> StatsSnapshot
    where
        S: EventSource,
        F: Future<Output = ()>,
    {
        let (shards, workers) = self.spawn_workers();
        tracing::info!(
            workers = workers.len(),
            queue = self.config.queue,
            backend = self.store.backend().kind(),
            "reconciliation driver started"
        );

        tokio::pin!(shutdown);
        loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, draining in-flight merges");
                    break;
                }
                next = source.next_event() => next,
            };
            let Some(next) = next else {
                tracing::info!("event source exhausted");
                break;
            };
            let raw = match next {
                Ok(raw) => raw,
                Err(e) => {
                    self.stats.inc_source_errors();
                    tracing::warn!(error = %e, "skipping undecodable notification");
                    continue;
                }
            };
            self.stats.inc_received();

            let classification = classify_detailed(&raw);
            report(&raw, &classification);
            let milestone = match classification {
                Classification::Milestone(m) => m,
                Classification::NotPod { .. } => {
                    self.stats.inc_not_pod();
                    continue;
                }
                Classification::UnknownReason { .. } => {
                    self.stats.inc_unknown_reason();
                    continue;
                }
                Classification::Malformed(_) => {
                    self.stats.inc_malformed();
                    continue;
                }
            };

            let shard = shard_for(&milestone.identity.uid, shards.len());
            if let Err(mpsc::error::SendError(lost)) = shards[shard].send(milestone).await {
                self.stats.inc_failed();
                tracing::error!(
                    uid = %lost.identity.uid,
                    milestone = %lost.kind,
                    shard,
                    "merge worker gone, dropping milestone"
                );
            }
        }

        drop(shards);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "merge worker terminated abnormally");
            }
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            received = snapshot.received,
            merged = snapshot.merged(),
            dropped = snapshot.dropped(),
            recorded = snapshot.recorded,
            duplicates = snapshot.duplicates,
            failed = snapshot.failed,
            not_pod = snapshot.not_pod,
            unknown_reason = snapshot.unknown_reason,
            malformed = snapshot.malformed,
            source_errors = snapshot.source_errors,
            "reconciliation driver stopped"
        );
        snapshot
    }

    fn spawn_workers(&self) -> (Vec<mpsc::Sender<MilestoneEvent>>, Vec<JoinHandle<()>>) {
        (0..self.config.workers.max(1))
            .map(|shard| {
                let (tx, rx) = mpsc::channel(self.config.queue.max(1));
                let store = Arc::clone(&self.store);
                let stats = Arc::clone(&self.stats);
                (tx, tokio::spawn(merge_worker(shard, store, stats, rx)))
            })
            .unzip()
    }
}

/// Merge every milestone of one shard, in arrival order.
async fn merge_worker<B: RecordBackend>(
    shard: usize,
    store: Arc<ReconciliationStore<B>>,
    stats: Arc<DriverStats>,
    mut rx: mpsc::Receiver<MilestoneEvent>,
) {
    while let Some(event) = rx.recv().await {
        match store.merge(&event).await {
            Ok(outcome) if outcome.is_recorded() => stats.inc_recorded(),
            Ok(_) => stats.inc_duplicates(),
            Err(e) => {
                stats.inc_failed();
                tracing::error!(
                    uid = %event.identity.uid,
                    milestone = %event.kind,
                    at = %event.at,
                    retryable = e.is_retryable(),
                    error = %e,
                    "failed to merge milestone, dropping"
                );
            }
        }
    }
    tracing::debug!(shard, "merge worker drained");
}

/// Stable shard index for `uid`.
fn shard_for(uid: &PodUid, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    uid.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}
