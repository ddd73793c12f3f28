//! # Reconciliation Store
//!
//! The only write path for lifecycle records. [`ReconciliationStore::merge`]
//! folds one classified observation into the pod's durable record as a
//! single atomic read-modify-write:
//!
//! 1. Take the pod's keyed lock.
//! 2. Load the record, or start an empty one for an unseen pod.
//! 3. Apply the observation on the loaded copy (write-once per field,
//!    namespace/name refreshed).
//! 4. Save the copy unconditionally, checked against the revision read in
//!    step 2.
//! 5. On a revision conflict, back off and go back to step 2, up to the
//!    retry budget.
//!
//! Nothing is visible to readers until step 4 succeeds. A failed or
//! abandoned save leaves the previous revision in place, so an interrupted
//! merge is simply a merge that did not happen.

use podlife_core::{MilestoneEvent, PodIdentity, PodUid};
use podlife_state::{LifecycleRecord, MergeOutcome};

use crate::backend::{RecordBackend, Revision};
use crate::error::StoreError;
use crate::locks::KeyedLocks;
use crate::retry::RetryPolicy;

/// Atomic per-pod merge over a [`RecordBackend`].
#[derive(Debug)]
pub struct ReconciliationStore<B> {
    backend: B,
    locks: KeyedLocks,
    retry: RetryPolicy,
}

impl<B: RecordBackend> ReconciliationStore<B> {
    /// Store with the default retry budget.
    pub fn new(backend: B) -> Self {
        Self::with_retry(backend, RetryPolicy::default())
    }

    pub fn with_retry(backend: B, retry: RetryPolicy) -> Self {
        Self {
            backend,
            locks: KeyedLocks::new(),
            retry,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Primary-key lookup.
    pub async fn get(&self, uid: &PodUid) -> Result<Option<LifecycleRecord>, StoreError> {
        Ok(self.backend.load(uid).await?.map(|v| v.record))
    }

    /// The stored record for `identity` with its revision, or a fresh
    /// unsaved record at [`Revision::ABSENT`].
    async fn get_or_create(
        &self,
        identity: &PodIdentity,
    ) -> Result<(LifecycleRecord, Revision), StoreError> {
        Ok(match self.backend.load(&identity.uid).await? {
            Some(stored) => (stored.record, stored.revision),
            None => (LifecycleRecord::new(identity.clone()), Revision::ABSENT),
        })
    }

    /// Fold `event` into its pod's record and persist the result.
    ///
    /// On `Ok`, the targeted milestone is set in storage: either to the
    /// value it already had, or to `event.at` if it was unset.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`] / [`StoreError::Database`] if the
    ///   backend fails. Nothing was written.
    /// - [`StoreError::RetriesExhausted`] if every attempt lost a revision
    ///   race. Nothing was written by this call.
    pub async fn merge(&self, event: &MilestoneEvent) -> Result<MergeOutcome, StoreError> {
        let uid = &event.identity.uid;
        let _guard = self.locks.acquire(uid).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (mut record, revision) = self.get_or_create(&event.identity).await?;
            let outcome = record.apply(event)?;

            match self.backend.save(&record, revision).await {
                Ok(saved) => {
                    tracing::debug!(
                        uid = %uid,
                        milestone = %event.kind,
                        recorded = outcome.is_recorded(),
                        revision = %saved,
                        backend = self.backend.kind(),
                        "merged milestone"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Conflict { .. }) if self.retry.allows_another(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        uid = %uid,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "concurrent update of pod record, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    return Err(StoreError::RetriesExhausted {
                        uid: uid.clone(),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VersionedRecord;
    use crate::memory::MemoryBackend;
    use podlife_core::{MilestoneKind, Timestamp};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(secs).unwrap()
    }

    fn event(uid: &str, kind: MilestoneKind, secs: i64) -> MilestoneEvent {
        MilestoneEvent::new(
            PodIdentity::new(PodUid::new(uid).unwrap(), "default", "nginx"),
            kind,
            at(secs),
        )
    }

    fn uid(s: &str) -> PodUid {
        PodUid::new(s).unwrap()
    }

    /// Wraps a memory backend and fails the next `n` saves.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_saves: AtomicU32,
        conflict_saves: AtomicU32,
        saves: AtomicU32,
    }

    impl FlakyBackend {
        fn failing(n: u32) -> Self {
            let b = Self::default();
            b.fail_saves.store(n, Ordering::SeqCst);
            b
        }

        fn conflicting(n: u32) -> Self {
            let b = Self::default();
            b.conflict_saves.store(n, Ordering::SeqCst);
            b
        }

        fn take(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl RecordBackend for FlakyBackend {
        async fn load(&self, uid: &PodUid) -> Result<Option<VersionedRecord>, StoreError> {
            self.inner.load(uid).await
        }

        async fn save(
            &self,
            record: &LifecycleRecord,
            expected: Revision,
        ) -> Result<Revision, StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if Self::take(&self.fail_saves) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            if Self::take(&self.conflict_saves) {
                return Err(StoreError::Conflict {
                    uid: record.uid().clone(),
                    expected,
                });
            }
            self.inner.save(record, expected).await
        }

        fn kind(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn first_merge_creates_record() {
        let store = ReconciliationStore::new(MemoryBackend::new());
        let outcome = store
            .merge(&event("42", MilestoneKind::Scheduled, 10))
            .await
            .unwrap();
        assert!(outcome.is_recorded());

        let record = store.get(&uid("42")).await.unwrap().unwrap();
        assert_eq!(record.get(MilestoneKind::Scheduled), Some(at(10)));
        assert_eq!(record.milestones().observed(), 1);
        assert_eq!(record.identity().namespace, "default");
        assert_eq!(store.backend().revision(&uid("42")), Revision::new(1));
    }

    #[tokio::test]
    async fn first_write_wins_in_either_time_order() {
        for (t1, t2) in [(10, 5), (5, 10)] {
            let store = ReconciliationStore::new(MemoryBackend::new());
            store
                .merge(&event("42", MilestoneKind::PullStarted, t1))
                .await
                .unwrap();
            let second = store
                .merge(&event("42", MilestoneKind::PullStarted, t2))
                .await
                .unwrap();
            assert!(!second.is_recorded());
            let record = store.get(&uid("42")).await.unwrap().unwrap();
            assert_eq!(record.get(MilestoneKind::PullStarted), Some(at(t1)));
        }
    }

    #[tokio::test]
    async fn duplicate_merge_is_idempotent_but_still_persists() {
        let store = ReconciliationStore::new(MemoryBackend::new());
        let e = event("42", MilestoneKind::ContainerCreated, 30);
        store.merge(&e).await.unwrap();
        let once = store.get(&uid("42")).await.unwrap().unwrap();

        store.merge(&e).await.unwrap();
        let twice = store.get(&uid("42")).await.unwrap().unwrap();

        assert_eq!(once.milestones(), twice.milestones());
        assert_eq!(store.backend().revision(&uid("42")), Revision::new(2));
    }

    #[tokio::test]
    async fn merge_refreshes_identity_on_no_op() {
        let store = ReconciliationStore::new(MemoryBackend::new());
        store
            .merge(&event("42", MilestoneKind::Scheduled, 10))
            .await
            .unwrap();
        let moved = MilestoneEvent::new(
            PodIdentity::new(uid("42"), "prod", "nginx-0"),
            MilestoneKind::Scheduled,
            at(11),
        );
        store.merge(&moved).await.unwrap();

        let record = store.get(&uid("42")).await.unwrap().unwrap();
        assert_eq!(record.identity().namespace, "prod");
        assert_eq!(record.identity().name, "nginx-0");
        assert_eq!(record.get(MilestoneKind::Scheduled), Some(at(10)));
    }

    #[tokio::test]
    async fn failed_save_is_not_applied() {
        let store = ReconciliationStore::new(FlakyBackend::failing(1));
        let err = store
            .merge(&event("42", MilestoneKind::Scheduled, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
        assert!(store.get(&uid("42")).await.unwrap().is_none());

        // Redelivery after the outage records the milestone.
        store
            .merge(&event("42", MilestoneKind::Scheduled, 10))
            .await
            .unwrap();
        let record = store.get(&uid("42")).await.unwrap().unwrap();
        assert_eq!(record.get(MilestoneKind::Scheduled), Some(at(10)));
    }

    #[tokio::test]
    async fn failed_save_does_not_count_as_first_write() {
        let store = ReconciliationStore::new(MemoryBackend::new());
        store
            .merge(&event("42", MilestoneKind::Scheduled, 10))
            .await
            .unwrap();

        let flaky = ReconciliationStore::new(FlakyBackend {
            inner: store.backend().clone(),
            fail_saves: AtomicU32::new(1),
            ..Default::default()
        });
        assert!(flaky
            .merge(&event("42", MilestoneKind::PullStarted, 12))
            .await
            .is_err());
        flaky
            .merge(&event("42", MilestoneKind::PullStarted, 15))
            .await
            .unwrap();

        let record = store.get(&uid("42")).await.unwrap().unwrap();
        assert_eq!(record.get(MilestoneKind::PullStarted), Some(at(15)));
        assert_eq!(record.get(MilestoneKind::Scheduled), Some(at(10)));
    }

    #[tokio::test]
    async fn conflicts_are_retried_within_budget() {
        let store = ReconciliationStore::with_retry(FlakyBackend::conflicting(2), fast_retry(3));
        store
            .merge(&event("42", MilestoneKind::ContainerStarted, 40))
            .await
            .unwrap();
        assert_eq!(store.backend().saves.load(Ordering::SeqCst), 3);
        let record = store.get(&uid("42")).await.unwrap().unwrap();
        assert_eq!(record.get(MilestoneKind::ContainerStarted), Some(at(40)));
    }

    #[tokio::test]
    async fn conflicts_beyond_budget_surface_as_exhausted() {
        let store = ReconciliationStore::with_retry(FlakyBackend::conflicting(10), fast_retry(3));
        let err = store
            .merge(&event("42", MilestoneKind::Killing, 50))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::RetriesExhausted { attempts: 3, .. }
        ));
        assert!(err.is_retryable());
        assert_eq!(store.backend().saves.load(Ordering::SeqCst), 3);
        assert!(store.get(&uid("42")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_kinds_for_one_pod_lose_nothing() {
        let store = Arc::new(ReconciliationStore::new(MemoryBackend::new()));
        let mut tasks = Vec::new();
        for (i, kind) in MilestoneKind::ALL.into_iter().enumerate() {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.merge(&event("42", kind, 100 + i as i64)).await
            }));
        }
        for t in tasks {
            assert!(t.await.unwrap().unwrap().is_recorded());
        }

        let record = store.get(&uid("42")).await.unwrap().unwrap();
        for (i, kind) in MilestoneKind::ALL.into_iter().enumerate() {
            assert_eq!(record.get(kind), Some(at(100 + i as i64)), "{kind}");
        }
        assert_eq!(
            store.backend().revision(&uid("42")),
            Revision::new(MilestoneKind::ALL.len() as u64)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_kind_records_exactly_one_value() {
        let store = Arc::new(ReconciliationStore::new(MemoryBackend::new()));
        let mut tasks = Vec::new();
        for secs in 0..20 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .merge(&event("42", MilestoneKind::Scheduled, secs))
                    .await
            }));
        }
        let mut recorded = Vec::new();
        for t in tasks {
            let outcome = t.await.unwrap().unwrap();
            if outcome.is_recorded() {
                recorded.push(outcome.stored());
            }
        }
        assert_eq!(recorded.len(), 1);
        let record = store.get(&uid("42")).await.unwrap().unwrap();
        assert_eq!(record.get(MilestoneKind::Scheduled), Some(recorded[0]));
    }

    /// Two stores sharing one backend model two processes sharing one
    /// database: their keyed locks are independent, so only the revision
    /// check keeps them from losing updates.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn independent_stores_on_shared_backend_lose_nothing() {
        let backend = MemoryBackend::new();
        let retry = RetryPolicy::new(50, Duration::from_millis(1));
        let a = Arc::new(ReconciliationStore::with_retry(backend.clone(), retry));
        let b = Arc::new(ReconciliationStore::with_retry(backend.clone(), retry));

        let mut tasks = Vec::new();
        for (i, kind) in MilestoneKind::ALL.into_iter().enumerate() {
            let store = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
            tasks.push(tokio::spawn(async move {
                store.merge(&event("42", kind, i as i64)).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let record = backend.get(&uid("42")).unwrap();
        assert_eq!(record.milestones().observed(), MilestoneKind::ALL.len());
    }

    #[tokio::test]
    async fn different_pods_are_independent() {
        let store = ReconciliationStore::new(MemoryBackend::new());
        store
            .merge(&event("a", MilestoneKind::Scheduled, 1))
            .await
            .unwrap();
        store
            .merge(&event("b", MilestoneKind::PullFinished, 2))
            .await
            .unwrap();
        let a = store.get(&uid("a")).await.unwrap().unwrap();
        let b = store.get(&uid("b")).await.unwrap().unwrap();
        assert_eq!(a.milestones().observed(), 1);
        assert_eq!(b.get(MilestoneKind::Scheduled), None);
        assert_eq!(store.backend().len(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_kind() -> impl Strategy<Value = MilestoneKind> {
            prop::sample::select(MilestoneKind::ALL.to_vec())
        }

        proptest! {
            /// Replaying any stream through the store leaves each slot at the
            /// first time delivered for it, and untouched slots empty.
            #[test]
            fn store_matches_first_delivery(
                stream in prop::collection::vec((0usize..3, arb_kind(), 0i64..1_000), 1..40)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let store = ReconciliationStore::new(MemoryBackend::new());
                let pods = ["a", "b", "c"];

                rt.block_on(async {
                    for (pod, kind, secs) in &stream {
                        store.merge(&event(pods[*pod], *kind, *secs)).await.unwrap();
                    }
                });

                for (p, name) in pods.iter().enumerate() {
                    let stored = store.backend().get(&uid(name));
                    for kind in MilestoneKind::ALL {
                        let first = stream
                            .iter()
                            .find(|(pod, k, _)| *pod == p && *k == kind)
                            .map(|(_, _, secs)| at(*secs));
                        let got = stored.as_ref().and_then(|r| r.get(kind));
                        prop_assert_eq!(got, first);
                    }
                }
            }
        }
    }
}
