//! HTTP Remote Executor
//!
//! `RemoteExecutor` backed by a worker service reachable over HTTP. Each call is a
//! single request; transport failures surface as errors and the executor decides
//! what to do with them.

use super::protocol::*;
use crate::error::{Error, Result};
use crate::executor::remote::RemoteExecutor;
use crate::executor::types::*;

use std::time::Duration;

pub struct HttpRemoteExecutor {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpRemoteExecutor {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queries the worker's health endpoint.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}{}", self.base_url, ENDPOINT_HEALTH);
        let response = self
            .http_client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Dispatch(format!("GET {} failed: {}", url, e)))?;

        response
            .json::<HealthResponse>()
            .await
            .map_err(|e| Error::Dispatch(format!("Invalid health response from {}: {}", url, e)))
    }
}

impl RemoteExecutor for HttpRemoteExecutor {
    async fn invoke(&self, payload: TaskPayload) -> Result<InvocationId> {
        let url = format!("{}{}", self.base_url, ENDPOINT_INVOKE);
        let chunk_index = payload.chunk.chunk_index;

        let response = self
            .http_client
            .post(url.clone())
            .json(&InvokeRequest { payload })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Dispatch(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response.json::<InvokeResponse>().await.ok();

        if status == reqwest::StatusCode::ACCEPTED {
            if let Some(invocation_id) = body.and_then(|body| body.invocation_id) {
                return Ok(invocation_id);
            }
            return Err(Error::Dispatch(format!(
                "Worker accepted chunk {} without an invocation id",
                chunk_index
            )));
        }

        let reason = body
            .and_then(|body| body.error)
            .unwrap_or_else(|| status.to_string());

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Worker quota reached while invoking chunk {}", chunk_index);
        }

        Err(Error::Dispatch(format!(
            "Worker rejected chunk {} ({}): {}",
            chunk_index, status, reason
        )))
    }

    async fn poll(&self, invocation_id: &InvocationId) -> Result<TaskStatus> {
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_STATUS, invocation_id);

        let response = self
            .http_client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Dispatch(format!("GET {} failed: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(TaskStatus::Failed {
                error: format!("Invocation {} is unknown to the worker", invocation_id),
            });
        }
        if !response.status().is_success() {
            return Err(Error::Dispatch(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let body = response
            .json::<Option<StatusResponse>>()
            .await
            .map_err(|e| Error::Dispatch(format!("Invalid status response from {}: {}", url, e)))?;

        Ok(body.map(|body| body.status).unwrap_or_else(|| TaskStatus::Failed {
            error: format!("Invocation {} is unknown to the worker", invocation_id),
        }))
    }

    async fn cancel(&self, invocation_id: &InvocationId) -> Result<bool> {
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_CANCEL, invocation_id);

        let response = self
            .http_client
            .post(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Dispatch(format!("POST {} failed: {}", url, e)))?;

        let body = response
            .json::<CancelResponse>()
            .await
            .map_err(|e| Error::Dispatch(format!("Invalid cancel response from {}: {}", url, e)))?;

        Ok(body.cancelled)
    }
}
