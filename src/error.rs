//! Error Taxonomy
//!
//! Every fallible operation of the library returns [`Result`]. Variants map onto the
//! lifecycle of a run: argument validation, dispatch to the remote service, failures
//! inside a worker, and the terminal outcomes surfaced by `get_result`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The last error recorded for a chunk that ran out of retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk_index: u32,
    pub attempts: u32,
    pub error: String,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} after {} attempt(s): {}",
            self.chunk_index, self.attempts, self.error
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad partition request or configuration. Never retried.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// The remote service rejected the invocation before it ran.
    #[error("Dispatch rejected - {0}")]
    Dispatch(String),

    /// The map function failed inside the remote worker.
    #[error("Worker failure on chunk {chunk_index} - {error}")]
    WorkerFailure { chunk_index: u32, error: String },

    /// One or more chunks exhausted their retry budget.
    #[error("Partial failure - {} chunk(s) failed: {}", failures.len(), join(failures))]
    PartialFailure { failures: Vec<ChunkFailure> },

    /// The deadline passed while these chunks were still in flight.
    #[error("Timeout - {} chunk(s) still pending: {:?}", pending.len(), pending)]
    Timeout { pending: Vec<u32> },

    /// The run was cancelled before every chunk completed.
    #[error("Run cancelled - {} chunk(s) did not complete", chunks.len())]
    Cancelled { chunks: Vec<u32> },

    #[error("Storage error - {0}")]
    Storage(String),

    #[error("Internal error - {0}")]
    Internal(String),
}

fn join(failures: &[ChunkFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
