//! LiDAR Scatter/Gather Execution Library
//!
//! This library crate fans a map function out over byte-range chunks of a LiDAR
//! point-cloud object stored in an object store, and gathers the per-chunk results back
//! in chunk order. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`executor`**: The scatter/gather engine. Partitions an object, dispatches one
//!   invocation per chunk, polls, retries within a per-chunk budget and aggregates.
//! - **`storage`**: Object locators, size lookup (`ObjectMetadata`) and the byte-range
//!   partitioner.
//! - **`worker`**: The remote side. Runs registered map functions in isolation, either
//!   in-process or behind an HTTP API.
//! - **`config`**: Executor and worker settings, with environment overrides.
//! - **`error`**: The error taxonomy shared by every module.

pub mod config;
pub mod error;
pub mod executor;
pub mod storage;
pub mod worker;
