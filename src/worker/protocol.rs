//! Network Protocol Definitions
//!
//! Defines the Data Transfer Objects (DTOs) exchanged between an executor and a
//! worker service over HTTP.
//!
//! Constants define the API endpoints served by every worker.

use crate::executor::types::*;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_INVOKE: &str = "/invoke";
pub const ENDPOINT_STATUS: &str = "/status";
pub const ENDPOINT_CANCEL: &str = "/cancel";
pub const ENDPOINT_HEALTH: &str = "/health";

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub payload: TaskPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub invocation_id: Option<InvocationId>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub invocation_id: InvocationId,
    pub status: TaskStatus,
    pub chunk_index: u32,
    pub attempt: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub invocation_id: InvocationId,
    pub cancelled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub functions: Vec<String>,
}
