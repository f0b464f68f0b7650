//! Scatter/Gather Executor
//!
//! Drives one run from partitioning to the ordered result list.
//!
//! ## Responsibilities
//! - **Fan-out**: Partitions the object and dispatches every chunk concurrently.
//! - **State**: Sole authority over task transitions; statuses observed by the
//!   `InvocationClient` are applied here and nowhere else.
//! - **Retries**: Re-invokes failed or rejected chunks within the per-chunk budget,
//!   after a jittered backoff, replacing the task in its slot.
//! - **Gathering**: `get_result` is the only blocking call; it returns the aggregated
//!   results, or a `PartialFailure`, `Timeout` or `Cancelled` error.

use super::aggregator::aggregate;
use super::invoker::InvocationClient;
use super::remote::RemoteExecutor;
use super::run::ExecutionRun;
use super::types::*;
use crate::config::ExecutorConfig;
use crate::error::{ChunkFailure, Error, Result};
use crate::storage::locator::DataLocator;
use crate::storage::metadata::{resolve_locator, ObjectMetadata};
use crate::storage::partitioner::{partition, ChunkDescriptor};

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct LidarExecutor<R> {
    executor_id: String,
    config: ExecutorConfig,
    invoker: InvocationClient<R>,
}

impl<R: RemoteExecutor> LidarExecutor<R> {
    /// Creates an executor bound to one remote backend.
    ///
    /// Fails with `InvalidArgument` if the configuration is inconsistent.
    pub fn new(remote: Arc<R>, config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let executor_id = create_executor_id();
        tracing::debug!(
            "LidarExecutor created with ID: {} (retry budget {})",
            executor_id,
            config.retry_budget
        );

        Ok(Self {
            invoker: InvocationClient::new(remote, &executor_id),
            executor_id,
            config,
        })
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Partitions `locator` into `chunk_count` chunks and dispatches `function` on each.
    ///
    /// Returns once every dispatch was attempted; results are collected by `get_result`.
    pub async fn map(
        &self,
        function: &str,
        locator: &DataLocator,
        chunk_count: u32,
    ) -> Result<ExecutionRun> {
        self.map_with_params(function, locator, chunk_count, serde_json::Value::Null)
            .await
    }

    /// Like [`Self::map`], passing `params` to every invocation.
    pub async fn map_with_params(
        &self,
        function: &str,
        locator: &DataLocator,
        chunk_count: u32,
        params: serde_json::Value,
    ) -> Result<ExecutionRun> {
        if function.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "map function name must not be empty".to_string(),
            ));
        }

        let chunks = partition(locator, chunk_count)?;
        let run_id = RunId::new();

        tracing::info!(
            "ExecutorID {} | RunID {} - Starting function invocation: {}() on {} - Total: {} activations",
            self.executor_id,
            run_id,
            function,
            locator,
            chunks.len()
        );

        let dispatches = chunks
            .iter()
            .map(|chunk| self.dispatch(&run_id, function, chunk, 1, &params));
        let tasks = join_all(dispatches).await;

        Ok(ExecutionRun {
            run_id,
            function: function.to_string(),
            params,
            locator: locator.clone(),
            chunks,
            tasks,
            cancelled: false,
            created_at: now_ms(),
        })
    }

    /// Resolves a `cos://<bucket>/<key>` URL through `store`, then calls `map_with_params`.
    pub async fn map_object<M: ObjectMetadata>(
        &self,
        store: &M,
        function: &str,
        url: &str,
        chunk_count: u32,
        params: serde_json::Value,
    ) -> Result<ExecutionRun> {
        let locator = resolve_locator(store, url).await?;
        self.map_with_params(function, &locator, chunk_count, params)
            .await
    }

    /// Blocks until every chunk of `run` succeeded, or the run reaches another outcome.
    ///
    /// `timeout` overrides the configured default; `None` on both waits indefinitely.
    ///
    /// # Returns
    /// * `Ok(results)` ordered by chunk index.
    /// * `Err(PartialFailure)` when chunks exhausted their retry budget, listing all of them.
    /// * `Err(Timeout)` when the deadline passed first. Results gathered so far stay on the run.
    /// * `Err(Cancelled)` when the run was cancelled.
    pub async fn get_result(
        &self,
        run: &mut ExecutionRun,
        timeout: Option<Duration>,
    ) -> Result<Vec<serde_json::Value>> {
        let deadline = timeout.or(self.config.timeout).map(|t| Instant::now() + t);

        loop {
            if run.cancelled {
                return Err(Error::Cancelled {
                    chunks: unfinished_chunks(run),
                });
            }

            self.refresh(run, deadline).await;
            let retried = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.retry_failed(run))
                    .await
                    .is_ok(),
                None => {
                    self.retry_failed(run).await;
                    true
                }
            };
            if !retried {
                let pending = self.in_flight_chunks(run);
                tracing::warn!(
                    "ExecutorID {} | RunID {} - Timed out re-invoking chunks, {} chunk(s) pending",
                    self.executor_id,
                    run.run_id,
                    pending.len()
                );
                return Err(Error::Timeout { pending });
            }

            if run.is_complete() {
                tracing::info!(
                    "ExecutorID {} | RunID {} - All {} chunks completed",
                    self.executor_id,
                    run.run_id,
                    run.tasks.len()
                );
                return aggregate(&run.tasks);
            }

            let in_flight = self.in_flight_chunks(run);
            if in_flight.is_empty() {
                let failures = self.exhausted_failures(run);
                if failures.is_empty() {
                    return Err(Error::Internal(format!(
                        "run {} is neither complete nor in flight",
                        run.run_id
                    )));
                }
                tracing::error!(
                    "ExecutorID {} | RunID {} - {} chunk(s) exhausted the retry budget",
                    self.executor_id,
                    run.run_id,
                    failures.len()
                );
                return Err(Error::PartialFailure { failures });
            }

            let now = Instant::now();
            let sleep_for = match deadline {
                Some(deadline) if now >= deadline => {
                    tracing::warn!(
                        "ExecutorID {} | RunID {} - Timed out with {} chunk(s) pending",
                        self.executor_id,
                        run.run_id,
                        in_flight.len()
                    );
                    return Err(Error::Timeout { pending: in_flight });
                }
                Some(deadline) => self.config.poll_interval.min(deadline - now),
                None => self.config.poll_interval,
            };

            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Marks every unfinished task `Cancelled` and asks the remote side to stop it.
    ///
    /// Invocations that still complete remotely are ignored from now on.
    pub async fn cancel(&self, run: &mut ExecutionRun) {
        run.cancelled = true;

        let requests = run
            .tasks
            .iter()
            .filter(|task| !task.is_terminal())
            .map(|task| async move { (task.chunk_index, self.invoker.cancel(task).await) });

        for (chunk_index, outcome) in join_all(requests).await {
            if let Err(e) = outcome {
                tracing::warn!(
                    "RunID {} - Cancel request for chunk {} failed: {}",
                    run.run_id,
                    chunk_index,
                    e
                );
            }
        }

        let mut cancelled = 0;
        for task in run.tasks.iter_mut() {
            if task.apply(TaskStatus::Cancelled) {
                cancelled += 1;
            }
        }

        tracing::info!(
            "ExecutorID {} | RunID {} - Cancelled {} in-flight chunk(s)",
            self.executor_id,
            run.run_id,
            cancelled
        );
    }

    /// Submits one chunk. A rejection becomes a failed task so it is retried like a
    /// failure inside the worker.
    async fn dispatch(
        &self,
        run_id: &RunId,
        function: &str,
        chunk: &ChunkDescriptor,
        attempt: u32,
        params: &serde_json::Value,
    ) -> Task {
        match self
            .invoker
            .invoke(run_id, function, chunk, attempt, params)
            .await
        {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(
                    "RunID {} - Dispatch of chunk {} rejected (attempt {}): {}",
                    run_id,
                    chunk.chunk_index,
                    attempt,
                    e
                );
                Task::rejected(chunk.chunk_index, attempt, e.to_string())
            }
        }
    }

    /// Polls every non-terminal task once and applies the observed statuses.
    ///
    /// A poll still unanswered at `deadline` is abandoned and the task stays as it was.
    async fn refresh(&self, run: &mut ExecutionRun, deadline: Option<Instant>) {
        let polls = run
            .tasks
            .iter()
            .filter(|task| !task.is_terminal())
            .map(|task| async move {
                let poll = self.invoker.poll(task);
                let observed = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, poll).await.ok(),
                    None => Some(poll.await),
                };
                (task.chunk_index, observed)
            });
        let observations = join_all(polls).await;

        for (chunk_index, observed) in observations {
            let Some(task) = run.tasks.get_mut(chunk_index as usize) else {
                continue;
            };
            let Some(observed) = observed else {
                tracing::debug!(
                    "RunID {} - Poll of chunk {} unanswered at the deadline",
                    run.run_id,
                    chunk_index
                );
                continue;
            };

            match observed {
                Ok(status) => {
                    if !task.apply(status) {
                        continue;
                    }
                    match &task.status {
                        TaskStatus::Succeeded { .. } => tracing::debug!(
                            "RunID {} - Chunk {} succeeded (attempt {})",
                            run.run_id,
                            chunk_index,
                            task.attempts
                        ),
                        TaskStatus::Failed { error } => tracing::warn!(
                            "RunID {} - {} (attempt {})",
                            run.run_id,
                            Error::WorkerFailure {
                                chunk_index,
                                error: error.clone(),
                            },
                            task.attempts
                        ),
                        status => tracing::trace!(
                            "RunID {} - Chunk {} is now {:?}",
                            run.run_id,
                            chunk_index,
                            status
                        ),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "RunID {} - Could not observe chunk {}: {}",
                        run.run_id,
                        chunk_index,
                        e
                    );
                }
            }
        }
    }

    /// Re-invokes failed chunks that still have budget once their backoff elapsed.
    async fn retry_failed(&self, run: &mut ExecutionRun) {
        let now = Instant::now();
        let mut due = Vec::new();

        for task in run.tasks.iter_mut() {
            if task.error().is_none() || task.attempts > self.config.retry_budget {
                continue;
            }
            match task.retry_at {
                None => {
                    let delay = self.config.backoff_for(task.attempts);
                    task.retry_at = Some(now + delay);
                    if delay.is_zero() {
                        due.push(task.chunk_index);
                    }
                }
                Some(at) if at <= now => due.push(task.chunk_index),
                Some(_) => {}
            }
        }

        if due.is_empty() {
            return;
        }

        let retries = due.iter().filter_map(|&chunk_index| {
            let chunk = run.chunks.get(chunk_index as usize)?;
            let attempt = run.tasks.get(chunk_index as usize)?.attempts + 1;

            tracing::info!(
                "RunID {} - Re-invoking chunk {} (attempt {} of {})",
                run.run_id,
                chunk_index,
                attempt,
                self.config.retry_budget + 1
            );

            Some(self.dispatch(&run.run_id, &run.function, chunk, attempt, &run.params))
        });
        let replacements = join_all(retries).await;

        for task in replacements {
            if let Some(slot) = run.tasks.get_mut(task.chunk_index as usize) {
                *slot = task;
            }
        }
    }

    /// Chunks that are running, or failed with budget left.
    fn in_flight_chunks(&self, run: &ExecutionRun) -> Vec<u32> {
        run.tasks
            .iter()
            .filter(|task| {
                !task.is_terminal()
                    || (task.error().is_some() && task.attempts <= self.config.retry_budget)
            })
            .map(|task| task.chunk_index)
            .collect()
    }

    fn exhausted_failures(&self, run: &ExecutionRun) -> Vec<ChunkFailure> {
        run.tasks
            .iter()
            .filter(|task| task.attempts > self.config.retry_budget)
            .filter_map(|task| {
                task.error().map(|error| ChunkFailure {
                    chunk_index: task.chunk_index,
                    attempts: task.attempts,
                    error: error.to_string(),
                })
            })
            .collect()
    }
}

fn unfinished_chunks(run: &ExecutionRun) -> Vec<u32> {
    run.tasks
        .iter()
        .filter(|task| task.result().is_none())
        .map(|task| task.chunk_index)
        .collect()
}

/// Short random id that prefixes every log line of an executor.
fn create_executor_id() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect()
}
