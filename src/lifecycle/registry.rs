//! Liveness registry shared by the supervisor (writer) and the dispatcher (reader).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

/// 1-based worker slot number. Stable across restarts of the same slot.
pub type WorkerId = usize;

/// Lifecycle state of one worker slot.
///
/// `Starting → Ready → Dead` on a normal run, `Ready → Draining → Dead` on
/// supervisor shutdown, and `Dead → Starting` only under a restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Draining,
    Dead,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Draining => write!(f, "draining"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEntry {
    pub id: WorkerId,
    pub port: u16,
    pub state: WorkerState,
    pub pid: Option<u32>,
    pub restarts: u32,
}

/// Cheaply cloneable handle to the `{worker_id → entry}` table.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    inner: Arc<RwLock<BTreeMap<WorkerId, WorkerEntry>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<WorkerId, WorkerEntry>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<WorkerId, WorkerEntry>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or resets) a slot in the `Starting` state.
    pub fn register(&self, id: WorkerId, port: u16) {
        self.write().insert(
            id,
            WorkerEntry {
                id,
                port,
                state: WorkerState::Starting,
                pid: None,
                restarts: 0,
            },
        );
    }

    /// Moves a slot to `state`, returning the previous state.
    pub fn transition(&self, id: WorkerId, state: WorkerState) -> Option<WorkerState> {
        let mut table = self.write();
        let entry = table.get_mut(&id)?;
        let previous = std::mem::replace(&mut entry.state, state);
        debug!(worker = id, from = %previous, to = %state, "Worker state changed");
        Some(previous)
    }

    pub fn set_pid(&self, id: WorkerId, pid: Option<u32>) {
        if let Some(entry) = self.write().get_mut(&id) {
            entry.pid = pid;
        }
    }

    /// Counts one more restart of the slot and returns the new total.
    pub fn record_restart(&self, id: WorkerId) -> u32 {
        match self.write().get_mut(&id) {
            Some(entry) => {
                entry.restarts += 1;
                entry.restarts
            }
            None => 0,
        }
    }

    pub fn get(&self, id: WorkerId) -> Option<WorkerEntry> {
        self.read().get(&id).cloned()
    }

    /// All slots, ascending by id.
    pub fn snapshot(&self) -> Vec<WorkerEntry> {
        self.read().values().cloned().collect()
    }

    /// Slots currently in the `Ready` state, ascending by id.
    pub fn ready(&self) -> Vec<WorkerEntry> {
        self.read()
            .values()
            .filter(|entry| entry.state == WorkerState::Ready)
            .cloned()
            .collect()
    }
}
