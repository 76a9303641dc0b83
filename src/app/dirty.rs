use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct DirtyState {
    pending: BTreeSet<usize>,
    processing: HashSet<usize>,
    triggered: bool,
    running: bool,
}

/// The set of chunk indices whose mask changed since their imagery was last
/// recomputed. Inserted from the interactive thread, drained by the worker.
/// A chunk re-marked while a recompute pass is in flight stays pending and
/// gets revisited; the trigger clears itself once the set drains.
pub struct DirtyChunks {
    state: Mutex<DirtyState>,
    work: Condvar,
}

impl DirtyChunks {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirtyState {
                pending: BTreeSet::new(),
                processing: HashSet::new(),
                triggered: false,
                running: true,
            }),
            work: Condvar::new(),
        }
    }

    /// Idempotent insert.
    pub fn mark_dirty(&self, chunk: usize) {
        self.state.lock().unwrap().pending.insert(chunk);
    }

    /// Raised at the end of a paint stroke; wakes the worker.
    pub fn trigger(&self) {
        self.state.lock().unwrap().triggered = true;
        self.work.notify_all();
    }

    /// Blocks until the trigger is raised or shutdown is requested, waking
    /// at least every `timeout` to stay responsive. Returns false once shut
    /// down.
    pub fn wait_for_trigger(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock().unwrap();
        while state.running && !state.triggered {
            let (next, _) = self.work.wait_timeout(state, timeout).unwrap();
            state = next;
        }
        state.running && state.triggered
    }

    /// Moves the lowest pending chunk to the processing marker. Clears the
    /// trigger and returns None once the pending set is empty.
    pub fn take_one(&self) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        if !state.running || !state.triggered {
            return None;
        }
        match state.pending.iter().next().copied() {
            Some(chunk) => {
                state.pending.remove(&chunk);
                state.processing.insert(chunk);
                Some(chunk)
            }
            None => {
                state.triggered = false;
                None
            }
        }
    }

    /// Completes one recompute pass. A re-mark that arrived during the pass
    /// is still in the pending set and survives this call.
    pub fn finish(&self, chunk: usize) {
        self.state.lock().unwrap().processing.remove(&chunk);
    }

    /// Puts a failed chunk back in the pending set.
    pub fn requeue(&self, chunk: usize) {
        let mut state = self.state.lock().unwrap();
        state.processing.remove(&chunk);
        state.pending.insert(chunk);
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.pending.is_empty() && state.processing.is_empty()
    }

    /// Chunks not yet up to date: pending plus in flight.
    pub fn pending_chunks(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state
            .pending
            .iter()
            .copied()
            .chain(state.processing.iter().copied())
            .collect()
    }

    pub fn shutdown(&self) {
        self.state.lock().unwrap().running = false;
        self.work.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }
}

impl Default for DirtyChunks {
    fn default() -> Self {
        Self::new()
    }
}
