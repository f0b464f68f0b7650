//! Worker Pool Implementation
//!
//! Runs map functions for accepted invocations. Each invocation executes in its own
//! tokio task and sees nothing but its `TaskPayload`; no state is shared between
//! invocations or carried over from earlier ones.
//!
//! ## Responsibilities
//! - **Admission**: Rejects payloads naming an unknown function, or arriving while
//!   `max_in_flight` invocations are already running.
//! - **Execution**: Invokes the function from the `MapFunctionRegistry`, turning errors
//!   and panics into a `Failed` status.
//! - **Status**: Keeps the latest status of every invocation for polling, and stops
//!   invocations on request.

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::executor::registry::MapFunctionRegistry;
use crate::executor::remote::RemoteExecutor;
use crate::executor::types::*;

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Why a payload was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    UnknownFunction(String),
    QuotaExceeded { max_in_flight: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownFunction(name) => write!(f, "Unknown map function: {}", name),
            Rejection::QuotaExceeded { max_in_flight } => write!(
                f,
                "Too many concurrent invocations in flight (limit {})",
                max_in_flight
            ),
        }
    }
}

/// The worker's record of one invocation.
#[derive(Debug, Clone)]
pub struct InvocationEntry {
    pub run_id: RunId,
    pub function: String,
    pub chunk_index: u32,
    pub attempt: u32,
    pub status: TaskStatus,
    /// Timestamp (ms) when the invocation was accepted.
    pub accepted_at: u64,
    /// Timestamp (ms) when the invocation reached a terminal status.
    pub finished_at: Option<u64>,
}

pub struct WorkerService {
    registry: Arc<MapFunctionRegistry>,
    invocations: Arc<DashMap<InvocationId, InvocationEntry>>,
    abort_handles: Arc<DashMap<InvocationId, AbortHandle>>,
    in_flight: Arc<AtomicUsize>,
    config: WorkerConfig,
}

impl WorkerService {
    pub fn new(registry: Arc<MapFunctionRegistry>, config: WorkerConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            invocations: Arc::new(DashMap::new()),
            abort_handles: Arc::new(DashMap::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            config,
        })
    }

    pub fn registry(&self) -> &Arc<MapFunctionRegistry> {
        &self.registry
    }

    /// Accepts a payload and starts executing it in the background.
    pub fn submit(&self, payload: TaskPayload) -> std::result::Result<InvocationId, Rejection> {
        if !self.registry.has_function(&payload.function) {
            tracing::warn!(
                "Rejected chunk {}: unknown map function '{}'",
                payload.chunk.chunk_index,
                payload.function
            );
            return Err(Rejection::UnknownFunction(payload.function));
        }

        let max_in_flight = self.config.max_in_flight;
        if self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max_in_flight).then_some(n + 1)
            })
            .is_err()
        {
            tracing::warn!(
                "Rejected chunk {}: {} invocations already in flight",
                payload.chunk.chunk_index,
                max_in_flight
            );
            return Err(Rejection::QuotaExceeded { max_in_flight });
        }

        let invocation_id = InvocationId::new();
        self.invocations.insert(
            invocation_id.clone(),
            InvocationEntry {
                run_id: payload.run_id.clone(),
                function: payload.function.clone(),
                chunk_index: payload.chunk.chunk_index,
                attempt: payload.attempt,
                status: TaskStatus::Pending,
                accepted_at: now_ms(),
                finished_at: None,
            },
        );

        tracing::info!(
            "Accepted invocation {} ({}() on chunk {}, attempt {})",
            invocation_id,
            payload.function,
            payload.chunk.chunk_index,
            payload.attempt
        );

        self.spawn_invocation(invocation_id.clone(), payload);

        Ok(invocation_id)
    }

    /// Runs the map function in its own task and records the outcome.
    ///
    /// The function runs in an inner task so a panic surfaces as a `JoinError`
    /// instead of leaving the invocation `Running` forever.
    fn spawn_invocation(&self, invocation_id: InvocationId, payload: TaskPayload) {
        let registry = self.registry.clone();
        let invocations = self.invocations.clone();
        let run_invocations = self.invocations.clone();
        let abort_handles = self.abort_handles.clone();
        let in_flight = self.in_flight.clone();
        let run_id = invocation_id.clone();

        let execution = tokio::spawn(async move {
            if let Some(mut entry) = run_invocations.get_mut(&run_id) {
                if entry.status == TaskStatus::Pending {
                    entry.status = TaskStatus::Running;
                }
            }
            registry.execute(payload).await
        });
        self.abort_handles
            .insert(invocation_id.clone(), execution.abort_handle());

        tokio::spawn(async move {
            let status = match execution.await {
                Ok(Ok(result)) => TaskStatus::Succeeded { result },
                Ok(Err(e)) => TaskStatus::Failed {
                    error: e.to_string(),
                },
                Err(join_error) if join_error.is_cancelled() => TaskStatus::Cancelled,
                Err(join_error) => TaskStatus::Failed {
                    error: format!("map function panicked: {}", join_error),
                },
            };

            abort_handles.remove(&invocation_id);
            if finish(&invocations, &in_flight, &invocation_id, status.clone()) {
                match status {
                    TaskStatus::Failed { error } => {
                        tracing::error!("Invocation {} failed: {}", invocation_id, error)
                    }
                    _ => tracing::info!("Invocation {} completed", invocation_id),
                }
            }
        });
    }

    /// Current status of an invocation, `None` if it is unknown.
    pub fn status(&self, invocation_id: &InvocationId) -> Option<TaskStatus> {
        self.invocations
            .get(invocation_id)
            .map(|entry| entry.status.clone())
    }

    pub fn invocation(&self, invocation_id: &InvocationId) -> Option<InvocationEntry> {
        self.invocations
            .get(invocation_id)
            .map(|entry| entry.value().clone())
    }

    /// Stops an unfinished invocation. Returns `false` if it was unknown or already done.
    pub fn cancel(&self, invocation_id: &InvocationId) -> bool {
        if !finish(
            &self.invocations,
            &self.in_flight,
            invocation_id,
            TaskStatus::Cancelled,
        ) {
            return false;
        }

        if let Some((_, handle)) = self.abort_handles.remove(invocation_id) {
            handle.abort();
        }

        tracing::info!("Invocation {} cancelled", invocation_id);
        true
    }

    /// Drops the records of invocations that finished at least `retention` ago.
    /// Returns how many were removed.
    ///
    /// Results younger than `retention` stay pollable, so `retention` must comfortably
    /// exceed the executors' poll interval.
    pub fn prune_finished(&self, retention: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(retention.as_millis() as u64);
        let before = self.invocations.len();
        self.invocations.retain(|_, entry| match entry.finished_at {
            Some(finished_at) => finished_at > cutoff,
            None => true,
        });
        before - self.invocations.len()
    }

    pub fn result_retention(&self) -> Duration {
        self.config.result_retention
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.config.max_in_flight
    }
}

/// Moves an invocation to a terminal status, once. The caller that performs the
/// transition releases the in-flight slot.
fn finish(
    invocations: &DashMap<InvocationId, InvocationEntry>,
    in_flight: &AtomicUsize,
    invocation_id: &InvocationId,
    status: TaskStatus,
) -> bool {
    let Some(mut entry) = invocations.get_mut(invocation_id) else {
        return false;
    };
    if entry.status.is_terminal() {
        return false;
    }
    entry.status = status;
    entry.finished_at = Some(now_ms());
    drop(entry);

    in_flight.fetch_sub(1, Ordering::SeqCst);
    true
}

impl RemoteExecutor for WorkerService {
    async fn invoke(&self, payload: TaskPayload) -> Result<InvocationId> {
        self.submit(payload)
            .map_err(|rejection| Error::Dispatch(rejection.to_string()))
    }

    async fn poll(&self, invocation_id: &InvocationId) -> Result<TaskStatus> {
        Ok(self
            .status(invocation_id)
            .unwrap_or_else(|| TaskStatus::Failed {
                error: format!("Invocation {} is unknown to the worker", invocation_id),
            }))
    }

    async fn cancel(&self, invocation_id: &InvocationId) -> Result<bool> {
        Ok(WorkerService::cancel(self, invocation_id))
    }
}
