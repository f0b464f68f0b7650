//! Result Aggregator
//!
//! Assembles per-chunk outputs into one sequence ordered by `chunk_index`,
//! independent of the order in which workers finished.

use super::types::{Task, TaskStatus};
use crate::error::{Error, Result};

/// Returns the results of `tasks` so that element `i` belongs to chunk `i`.
///
/// Every task must have succeeded and the chunk indices must be exactly `0..tasks.len()`.
/// Anything else is an internal invariant failure.
pub fn aggregate(tasks: &[Task]) -> Result<Vec<serde_json::Value>> {
    let mut slots: Vec<Option<serde_json::Value>> = vec![None; tasks.len()];

    for task in tasks {
        let slot = slots.get_mut(task.chunk_index as usize).ok_or_else(|| {
            Error::Internal(format!(
                "chunk index {} outside of a run with {} chunks",
                task.chunk_index,
                tasks.len()
            ))
        })?;

        let result = match &task.status {
            TaskStatus::Succeeded { result } => result.clone(),
            other => {
                return Err(Error::Internal(format!(
                    "chunk {} aggregated while {:?}",
                    task.chunk_index, other
                )));
            }
        };

        if slot.replace(result).is_some() {
            return Err(Error::Internal(format!(
                "chunk {} appears twice in the run",
                task.chunk_index
            )));
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(chunk_index, slot)| {
            slot.ok_or_else(|| Error::Internal(format!("chunk {} is missing", chunk_index)))
        })
        .collect()
}
