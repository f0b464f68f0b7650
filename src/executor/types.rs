use crate::storage::partitioner::ChunkDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Handle returned by the remote service for one accepted invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InvocationId(pub String);

impl InvocationId {
    /// Generates a new random UUID v4-based id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one `map`-to-`get_result` lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a task, as stored by the executor and reported by workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TaskStatus {
    /// Accepted by the remote service, not yet started.
    Pending,
    /// The map function is executing.
    Running,
    /// The map function returned a value.
    Succeeded { result: serde_json::Value },
    /// The map function returned an error, panicked, or the dispatch was rejected.
    Failed { error: String },
    /// Stopped on request before reaching another terminal state.
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded { .. } | TaskStatus::Failed { .. } | TaskStatus::Cancelled
        )
    }
}

/// Self-describing unit of work sent to a worker.
///
/// Workers are stateless, so everything the map function needs travels here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskPayload {
    pub executor_id: String,
    pub run_id: RunId,
    /// Name of the registered map function.
    pub function: String,
    pub chunk: ChunkDescriptor,
    /// 1 for the first invocation of a chunk, incremented per retry.
    pub attempt: u32,
    /// Caller-supplied parameters, identical for every chunk of a run.
    pub params: serde_json::Value,
    /// Timestamp (ms) when the payload was built.
    pub submitted_at: u64,
}

/// The executor's record of one chunk's current invocation.
#[derive(Debug, Clone)]
pub struct Task {
    pub chunk_index: u32,
    /// `None` when the dispatch itself was rejected.
    pub invocation_id: Option<InvocationId>,
    pub status: TaskStatus,
    /// Invocations attempted for this chunk so far, including the current one.
    pub attempts: u32,
    pub dispatched_at: u64,
    /// Earliest moment a failed task may be re-invoked.
    pub(crate) retry_at: Option<Instant>,
}

impl Task {
    /// A task whose invocation was accepted by the remote service.
    pub fn dispatched(chunk_index: u32, invocation_id: InvocationId, attempts: u32) -> Self {
        Self {
            chunk_index,
            invocation_id: Some(invocation_id),
            status: TaskStatus::Pending,
            attempts,
            dispatched_at: now_ms(),
            retry_at: None,
        }
    }

    /// A task whose invocation never reached a worker.
    pub fn rejected(chunk_index: u32, attempts: u32, error: String) -> Self {
        Self {
            chunk_index,
            invocation_id: None,
            status: TaskStatus::Failed { error },
            attempts,
            dispatched_at: now_ms(),
            retry_at: None,
        }
    }

    /// Applies a status observed on the remote side.
    ///
    /// Terminal states never change and a task never moves back to `Pending`.
    /// Returns `true` when the status changed.
    pub fn apply(&mut self, observed: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match (&self.status, &observed) {
            (_, TaskStatus::Pending) => false,
            (TaskStatus::Running, TaskStatus::Running) => false,
            _ => {
                self.status = observed;
                true
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        match &self.status {
            TaskStatus::Succeeded { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Snapshot of task states within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunProgress {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RunProgress {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.succeeded + self.failed + self.cancelled
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
