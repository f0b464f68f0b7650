//! Worker Module
//!
//! The remote side of a run. A worker accepts self-describing payloads, runs the named
//! map function on the payload's chunk in isolation and reports status until polled.
//!
//! ## Submodules
//! - **`service`**: Admission, execution and status of invocations. Also usable in-process
//!   as a `RemoteExecutor`.
//! - **`handlers`**: Axum handlers exposing the service over HTTP.
//! - **`client`**: `RemoteExecutor` that talks to a worker over HTTP.
//! - **`functions`**: Built-in map functions registered by the worker binary.
//! - **`protocol`**: Endpoint constants and request/response DTOs.

pub mod client;
pub mod functions;
pub mod handlers;
pub mod protocol;
pub mod service;

#[cfg(test)]
mod tests;
