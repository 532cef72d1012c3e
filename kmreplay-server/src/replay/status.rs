//! Replay session progress, readable from any thread while the worker runs.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    Running,
    Finished,
    Cancelled,
    Failed,
}

impl std::fmt::Display for ReplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayState::Running => write!(f, "running"),
            ReplayState::Finished => write!(f, "finished"),
            ReplayState::Cancelled => write!(f, "cancelled"),
            ReplayState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of session progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStatus {
    pub state: ReplayState,
    /// File being replayed (if any)
    pub current_file: Option<PathBuf>,
    /// Files read through to their last byte
    pub files_completed: u64,
    /// Files given up on after a framing problem, including files that end
    /// in a partial header
    pub files_abandoned: u64,
    /// Datagrams that passed framing validation
    pub datagrams_accepted: u64,
    /// Datagrams sent on the wire
    pub datagrams_forwarded: u64,
    /// Valid datagrams of a type that is not forwarded
    pub datagrams_discarded: u64,
    /// Cursor repositions after corrupted framing
    pub realignments: u64,
}

/// Counters shared between the worker (writer) and the handle (reader)
#[derive(Debug)]
pub(crate) struct SessionStats {
    state: RwLock<ReplayState>,
    current_file: RwLock<Option<PathBuf>>,
    pub files_completed: AtomicU64,
    pub files_abandoned: AtomicU64,
    pub datagrams_accepted: AtomicU64,
    pub datagrams_forwarded: AtomicU64,
    pub datagrams_discarded: AtomicU64,
    pub realignments: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ReplayState::Running),
            current_file: RwLock::new(None),
            files_completed: AtomicU64::new(0),
            files_abandoned: AtomicU64::new(0),
            datagrams_accepted: AtomicU64::new(0),
            datagrams_forwarded: AtomicU64::new(0),
            datagrams_discarded: AtomicU64::new(0),
            realignments: AtomicU64::new(0),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: ReplayState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn set_current_file(&self, path: Option<PathBuf>) {
        *self
            .current_file
            .write()
            .unwrap_or_else(PoisonError::into_inner) = path;
    }

    pub fn snapshot(&self) -> ReplayStatus {
        ReplayStatus {
            state: *self.state.read().unwrap_or_else(PoisonError::into_inner),
            current_file: self
                .current_file
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            files_completed: self.files_completed.load(Ordering::Relaxed),
            files_abandoned: self.files_abandoned.load(Ordering::Relaxed),
            datagrams_accepted: self.datagrams_accepted.load(Ordering::Relaxed),
            datagrams_forwarded: self.datagrams_forwarded.load(Ordering::Relaxed),
            datagrams_discarded: self.datagrams_discarded.load(Ordering::Relaxed),
            realignments: self.realignments.load(Ordering::Relaxed),
        }
    }
}
