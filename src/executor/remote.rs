//! Remote Execution Capability
//!
//! The executor never talks to a worker pool directly; it goes through this trait.
//! Implementations live in [`crate::worker`]: an in-process pool (`WorkerService`)
//! and an HTTP client for a pool running in another process (`HttpRemoteExecutor`).

use super::types::{InvocationId, TaskPayload, TaskStatus};
use crate::error::Result;

use std::future::Future;

pub trait RemoteExecutor: Send + Sync {
    /// Submits one payload. Returns as soon as the service accepted it.
    ///
    /// A rejection is reported as `Error::Dispatch` and never reaches a worker.
    fn invoke(&self, payload: TaskPayload)
        -> impl Future<Output = Result<InvocationId>> + Send;

    /// Reports the current status of an accepted invocation.
    ///
    /// An invocation the service no longer knows is reported as `Failed`.
    /// An `Err` means the status could not be observed right now.
    fn poll(&self, invocation_id: &InvocationId)
        -> impl Future<Output = Result<TaskStatus>> + Send;

    /// Best-effort request to stop an invocation. Returns whether it was stopped.
    fn cancel(&self, invocation_id: &InvocationId) -> impl Future<Output = Result<bool>> + Send;
}
