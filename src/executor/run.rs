//! Execution Runs
//!
//! An `ExecutionRun` is the caller's handle on one `map` call. It owns the chunk
//! descriptors and the task of every chunk, indexed by `chunk_index`. Only the
//! executor that created it changes its tasks.

use super::types::*;
use crate::storage::locator::DataLocator;
use crate::storage::partitioner::ChunkDescriptor;

#[derive(Debug)]
pub struct ExecutionRun {
    pub(crate) run_id: RunId,
    pub(crate) function: String,
    pub(crate) params: serde_json::Value,
    pub(crate) locator: DataLocator,
    pub(crate) chunks: Vec<ChunkDescriptor>,
    /// Slot `i` holds the current task of chunk `i`.
    pub(crate) tasks: Vec<Task>,
    pub(crate) cancelled: bool,
    pub(crate) created_at: u64,
}

impl ExecutionRun {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn locator(&self) -> &DataLocator {
        &self.locator
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, chunk_index: u32) -> Option<&Task> {
        self.tasks.get(chunk_index as usize)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Results gathered so far, ordered by chunk index. Stays available after a
    /// `Timeout` so callers can decide what to resubmit.
    pub fn completed_results(&self) -> Vec<(u32, &serde_json::Value)> {
        self.tasks
            .iter()
            .filter_map(|task| task.result().map(|result| (task.chunk_index, result)))
            .collect()
    }

    pub fn progress(&self) -> RunProgress {
        let mut progress = RunProgress::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => progress.pending += 1,
                TaskStatus::Running => progress.running += 1,
                TaskStatus::Succeeded { .. } => progress.succeeded += 1,
                TaskStatus::Failed { .. } => progress.failed += 1,
                TaskStatus::Cancelled => progress.cancelled += 1,
            }
        }
        progress
    }

    pub fn is_complete(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| matches!(task.status, TaskStatus::Succeeded { .. }))
    }
}
