//! Scatter/Gather Executor Module
//!
//! This module fans a map function out over the chunks of one LiDAR object and gathers
//! the per-chunk results back into a single ordered sequence.
//!
//! ## Architecture Overview
//! The executor follows a **Dispatch-then-Poll** model:
//! 1. **Partitioning**: The object is split into `chunk_count` disjoint byte ranges.
//! 2. **Dispatch**: Every chunk is packaged into a self-describing `TaskPayload` and submitted
//!    concurrently through a `RemoteExecutor`. Submission returns without waiting for results.
//! 3. **Polling**: `get_result` sweeps the in-flight tasks until every chunk reached a terminal
//!    state, re-invoking failed chunks while their retry budget lasts.
//! 4. **Aggregation**: Results are placed by `chunk_index`, never by completion order.
//!
//! ## Submodules
//! - **`executor`**: `LidarExecutor` with `map`, `get_result` and `cancel`.
//! - **`invoker`**: Builds payloads and talks to the `RemoteExecutor`.
//! - **`remote`**: The `RemoteExecutor` capability implemented by worker backends.
//! - **`aggregator`**: Orders per-chunk results.
//! - **`run`**: `ExecutionRun`, the handle returned by `map`.
//! - **`registry`**: Maps function names (e.g., "ground_points") to executable Rust code.
//! - **`types`**: Task, status and payload types shared with workers.

pub mod aggregator;
pub mod executor;
pub mod invoker;
pub mod registry;
pub mod remote;
pub mod run;
pub mod types;
