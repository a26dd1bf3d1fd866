//! Deduplicating queue of handles waiting to be reloaded

use lumen_core::AssetHandle;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::mem;

/// Pending reload requests.
///
/// Producers on any thread call [`submit`](ReloadQueue::submit); the main tick
/// drains. The lock is held only while the set itself is touched.
#[derive(Debug, Default)]
pub struct ReloadQueue {
    pending: Mutex<HashSet<AssetHandle>>,
}

impl ReloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a handle. Returns `false` if it was already pending.
    pub fn submit(&self, handle: AssetHandle) -> bool {
        self.pending.lock().insert(handle)
    }

    /// Take every pending handle, leaving the queue empty
    pub fn take(&self) -> HashSet<AssetHandle> {
        mem::take(&mut *self.pending.lock())
    }

    /// Take the pending set and run `process` on each handle outside the lock.
    /// Returns how many handles were processed.
    pub fn drain_and_process<F>(&self, mut process: F) -> usize
    where
        F: FnMut(AssetHandle),
    {
        let pending = self.take();
        let count = pending.len();
        for handle in pending {
            process(handle);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
