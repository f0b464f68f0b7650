//! Invocation Client
//!
//! Packages a chunk and a map function name into a `TaskPayload`, submits it through
//! a `RemoteExecutor` and hands back a `Task` handle. The client reports what it
//! observes on the remote side but never changes a `Task` itself, and it never retries:
//! the executor decides retries across the whole run.

use super::remote::RemoteExecutor;
use super::types::*;
use crate::error::Result;
use crate::storage::partitioner::ChunkDescriptor;

use std::sync::Arc;

pub struct InvocationClient<R> {
    remote: Arc<R>,
    executor_id: String,
}

impl<R: RemoteExecutor> InvocationClient<R> {
    pub fn new(remote: Arc<R>, executor_id: &str) -> Self {
        Self {
            remote,
            executor_id: executor_id.to_string(),
        }
    }

    /// Builds the self-describing payload for one invocation of `chunk`.
    pub fn build_payload(
        &self,
        run_id: &RunId,
        function: &str,
        chunk: &ChunkDescriptor,
        attempt: u32,
        params: &serde_json::Value,
    ) -> TaskPayload {
        TaskPayload {
            executor_id: self.executor_id.clone(),
            run_id: run_id.clone(),
            function: function.to_string(),
            chunk: chunk.clone(),
            attempt,
            params: params.clone(),
            submitted_at: now_ms(),
        }
    }

    /// Submits one chunk. Returns a `Pending` task once the remote service accepted it.
    ///
    /// Fails with `Error::Dispatch` if the service rejected the invocation.
    pub async fn invoke(
        &self,
        run_id: &RunId,
        function: &str,
        chunk: &ChunkDescriptor,
        attempt: u32,
        params: &serde_json::Value,
    ) -> Result<Task> {
        let payload = self.build_payload(run_id, function, chunk, attempt, params);
        let invocation_id = self.remote.invoke(payload).await?;

        tracing::debug!(
            "ExecutorID {} | RunID {} - Chunk {} dispatched (attempt {}) - Invocation ID: {}",
            self.executor_id,
            run_id,
            chunk.chunk_index,
            attempt,
            invocation_id
        );

        Ok(Task::dispatched(chunk.chunk_index, invocation_id, attempt))
    }

    /// Observes the remote status of a task. Tasks that were never dispatched report
    /// their recorded status unchanged.
    pub async fn poll(&self, task: &Task) -> Result<TaskStatus> {
        match &task.invocation_id {
            Some(invocation_id) => self.remote.poll(invocation_id).await,
            None => Ok(task.status.clone()),
        }
    }

    /// Forwards a cancellation request for the task's invocation, if it has one.
    pub async fn cancel(&self, task: &Task) -> Result<bool> {
        match &task.invocation_id {
            Some(invocation_id) => self.remote.cancel(invocation_id).await,
            None => Ok(false),
        }
    }
}
