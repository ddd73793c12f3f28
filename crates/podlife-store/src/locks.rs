//! # Keyed Locks
//!
//! One async mutex per pod UID, created on first use and discarded when
//! the last holder or waiter lets go. Merges for the same pod queue behind
//! each other in FIFO order (tokio mutexes are fair); merges for different
//! pods never touch the same mutex.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use podlife_core::PodUid;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters, including ones whose `acquire` is still pending.
    users: usize,
}

/// Registry of per-UID async mutexes.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<PodUid, Slot>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `uid`.
    ///
    /// Cancel-safe: dropping the future before it resolves releases its
    /// claim on the slot.
    pub async fn acquire(&self, uid: &PodUid) -> KeyedGuard<'_> {
        let registration = self.register(uid);
        let guard = Arc::clone(&registration.mutex).lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of UIDs currently held or awaited.
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }

    fn register(&self, uid: &PodUid) -> Registration<'_> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(uid.clone()).or_insert_with(|| Slot {
            mutex: Arc::default(),
            users: 0,
        });
        slot.users += 1;
        Registration {
            owner: self,
            uid: uid.clone(),
            mutex: Arc::clone(&slot.mutex),
        }
    }
}

/// A claim on one UID's slot, held from the start of `acquire` until the
/// guard is released or the pending acquire is dropped.
#[derive(Debug)]
struct Registration<'a> {
    owner: &'a KeyedLocks,
    uid: PodUid,
    mutex: Arc<AsyncMutex<()>>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock();
        let Some(slot) = slots.get_mut(&self.uid) else {
            return;
        };
        slot.users = slot.users.saturating_sub(1);
        if slot.users == 0 {
            slots.remove(&self.uid);
        }
    }
}

/// Exclusive access to one UID. Released on drop.
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    // Field order matters: the mutex is unlocked before the slot can be
    // discarded, so no second mutex is ever created for a held UID.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}
