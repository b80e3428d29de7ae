//! Run lifecycle events and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Validating,
    Executing,
    Completed,
    Cancelled,
}

/// Emitted once per recorded cell. `completed` grows by one each time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub completed: usize,
    pub total: usize,
    pub ligand_id: String,
    pub target_id: String,
    pub success: bool,
}

impl JobProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    StateChanged { state: RunState },
    JobFinished(JobProgress),
}

/// Cloneable cancellation flag, checked before every dispatch.
///
/// A raised flag applies to the current run, or to the next one if raised
/// between runs. The runner clears it when that run returns.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
