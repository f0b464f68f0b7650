//! Worker Module Tests
//!
//! ## Test Scopes
//! - **Service**: Admission, quota, execution outcomes and cancellation of invocations.
//! - **Local backend**: The executor driving an in-process `WorkerService`.
//! - **HTTP**: A worker served by axum on `127.0.0.1:0`, reached through `HttpRemoteExecutor`.

#[cfg(test)]
mod tests {
    use crate::config::{ExecutorConfig, WorkerConfig};
    use crate::error::Error;
    use crate::executor::executor::LidarExecutor;
    use crate::executor::registry::MapFunctionRegistry;
    use crate::executor::remote::RemoteExecutor;
    use crate::executor::types::*;
    use crate::storage::locator::DataLocator;
    use crate::storage::partitioner::partition;
    use crate::worker::client::HttpRemoteExecutor;
    use crate::worker::functions::register_builtin;
    use crate::worker::handlers::router;
    use crate::worker::protocol::*;
    use crate::worker::service::{Rejection, WorkerService};

    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn locator() -> DataLocator {
        DataLocator::new("lidar", "tiles/area_01.laz", 10)
    }

    fn payload(function: &str, chunk_index: u32, attempt: u32) -> TaskPayload {
        let chunk = partition(&locator(), 3).unwrap()[chunk_index as usize].clone();
        TaskPayload {
            executor_id: "test".to_string(),
            run_id: RunId::new(),
            function: function.to_string(),
            chunk,
            attempt,
            params: json!(null),
            submitted_at: now_ms(),
        }
    }

    fn worker(max_in_flight: usize) -> Arc<WorkerService> {
        let registry = MapFunctionRegistry::new();
        register_builtin(&registry);

        registry.register("slow", |_payload| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("late"))
        });
        registry.register("broken", |payload| async move {
            Err(anyhow::anyhow!(
                "Cannot read header of {}",
                payload.chunk.locator.key
            ))
        });
        registry.register("panics", |payload| async move {
            if payload.attempt > 0 {
                panic!("corrupt point record in chunk {}", payload.chunk.chunk_index);
            }
            Ok(json!(null))
        });
        registry.register("flaky", |payload| async move {
            if payload.attempt == 1 {
                return Err(anyhow::anyhow!("transient read error"));
            }
            Ok(json!(payload.chunk.chunk_index))
        });

        WorkerService::new(
            registry,
            WorkerConfig {
                max_in_flight,
                ..WorkerConfig::default()
            },
        )
    }

    fn test_config() -> ExecutorConfig {
        ExecutorConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_retry_backoff(Duration::ZERO, Duration::ZERO)
    }

    async fn wait_terminal(service: &WorkerService, invocation_id: &InvocationId) -> TaskStatus {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match service.status(invocation_id) {
                    Some(status) if status.is_terminal() => return status,
                    _ => tokio::time::sleep(Duration::from_millis(5)).await,
                }
            }
        })
        .await
        .expect("invocation did not finish")
    }

    async fn spawn_worker(service: Arc<WorkerService>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(service)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    // ============================================================
    // TEST 1: WorkerService
    // ============================================================

    #[tokio::test]
    async fn test_submit_runs_function() {
        let service = worker(8);

        let invocation_id = service.submit(payload("byte_length", 2, 1)).unwrap();
        let status = wait_terminal(&service, &invocation_id).await;

        assert_eq!(status, TaskStatus::Succeeded { result: json!(2) });
        assert_eq!(service.in_flight(), 0);
        assert_eq!(service.invocation(&invocation_id).unwrap().chunk_index, 2);
    }

    #[tokio::test]
    async fn test_unknown_function_is_rejected() {
        let service = worker(8);

        let rejection = service.submit(payload("nope", 0, 1)).unwrap_err();

        assert_eq!(rejection, Rejection::UnknownFunction("nope".to_string()));
        assert_eq!(service.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_quota_is_enforced() {
        // ARRANGE: one slot, taken by a slow invocation
        let service = worker(1);
        let first = service.submit(payload("slow", 0, 1)).unwrap();

        // ACT
        let rejection = service.submit(payload("chunk_index", 1, 1)).unwrap_err();

        // ASSERT
        assert_eq!(rejection, Rejection::QuotaExceeded { max_in_flight: 1 });

        // The slot frees up once the slow invocation is cancelled
        assert!(service.cancel(&first));
        assert_eq!(service.in_flight(), 0);
        assert!(service.submit(payload("chunk_index", 1, 1)).is_ok());
    }

    #[tokio::test]
    async fn test_function_error_becomes_failed_status() {
        let service = worker(8);

        let invocation_id = service.submit(payload("broken", 0, 1)).unwrap();
        let status = wait_terminal(&service, &invocation_id).await;

        match status {
            TaskStatus::Failed { error } => assert!(error.contains("Cannot read header")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_status() {
        let service = worker(8);

        let invocation_id = service.submit(payload("panics", 0, 1)).unwrap();
        let status = wait_terminal(&service, &invocation_id).await;

        match status {
            TaskStatus::Failed { error } => assert!(error.contains("panicked")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_is_final() {
        let service = worker(8);
        let invocation_id = service.submit(payload("slow", 0, 1)).unwrap();

        assert!(service.cancel(&invocation_id));
        assert!(!service.cancel(&invocation_id));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(service.status(&invocation_id), Some(TaskStatus::Cancelled));
        assert!(!service.cancel(&InvocationId::new()));
    }

    #[tokio::test]
    async fn test_unknown_invocation_polls_as_failed() {
        let service = worker(8);

        let status = RemoteExecutor::poll(service.as_ref(), &InvocationId::new())
            .await
            .unwrap();

        assert!(matches!(status, TaskStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_prune_finished_keeps_running_invocations() {
        let service = worker(8);
        let done = service.submit(payload("chunk_index", 0, 1)).unwrap();
        let running = service.submit(payload("slow", 1, 1)).unwrap();
        wait_terminal(&service, &done).await;

        assert_eq!(service.prune_finished(Duration::ZERO), 1);
        assert!(service.status(&done).is_none());
        assert!(service.status(&running).is_some());
        assert!(service.invocation(&running).unwrap().finished_at.is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_results_within_retention() {
        // ARRANGE: a result the executor has not polled yet
        let service = worker(8);
        let done = service.submit(payload("chunk_index", 0, 1)).unwrap();
        wait_terminal(&service, &done).await;
        assert!(service.invocation(&done).unwrap().finished_at.is_some());

        // ACT
        let removed = service.prune_finished(Duration::from_secs(60));

        // ASSERT: the result is still pollable
        assert_eq!(removed, 0);
        let status = RemoteExecutor::poll(service.as_ref(), &done).await.unwrap();
        assert_eq!(status, TaskStatus::Succeeded { result: json!(0) });
    }

    // ============================================================
    // TEST 2: Executor over the in-process worker
    // ============================================================

    #[tokio::test]
    async fn test_executor_with_local_worker() {
        let service = worker(8);
        let executor = LidarExecutor::new(service.clone(), test_config()).unwrap();

        let mut run = executor.map("byte_length", &locator(), 3).await.unwrap();
        let results = executor.get_result(&mut run, None).await.unwrap();

        assert_eq!(results, vec![json!(4), json!(4), json!(2)]);
    }

    #[tokio::test]
    async fn test_local_worker_failure_is_retried() {
        let service = worker(8);
        let executor = LidarExecutor::new(service.clone(), test_config()).unwrap();

        let mut run = executor.map("flaky", &locator(), 3).await.unwrap();
        let results = executor.get_result(&mut run, None).await.unwrap();

        assert_eq!(results, vec![json!(0), json!(1), json!(2)]);
        assert!(run.tasks().iter().all(|task| task.attempts == 2));
    }

    #[tokio::test]
    async fn test_unknown_function_exhausts_budget_locally() {
        let service = worker(8);
        let executor =
            LidarExecutor::new(service.clone(), test_config().with_retry_budget(1)).unwrap();

        let mut run = executor.map("nope", &locator(), 2).await.unwrap();
        let outcome = executor.get_result(&mut run, None).await;

        match outcome {
            Err(Error::PartialFailure { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].error.contains("Unknown map function"));
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }
    }

    // ============================================================
    // TEST 3: HTTP worker
    // ============================================================

    #[tokio::test]
    async fn test_executor_over_http() {
        let base_url = spawn_worker(worker(8)).await;
        let remote = Arc::new(HttpRemoteExecutor::new(&base_url));
        let executor = LidarExecutor::new(remote, test_config()).unwrap();

        let mut run = executor.map("chunk_index", &locator(), 3).await.unwrap();
        let results = executor
            .get_result(&mut run, Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(results, vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_http_rejections() {
        let base_url = spawn_worker(worker(1)).await;
        let remote = HttpRemoteExecutor::new(&base_url);

        let unknown = remote.invoke(payload("nope", 0, 1)).await;
        match unknown {
            Err(Error::Dispatch(reason)) => {
                assert!(reason.contains("404"));
                assert!(reason.contains("Unknown map function"));
            }
            other => panic!("expected Dispatch, got {:?}", other),
        }

        let slow = remote.invoke(payload("slow", 0, 1)).await.unwrap();
        let over_quota = remote.invoke(payload("chunk_index", 1, 1)).await;
        assert!(matches!(over_quota, Err(Error::Dispatch(reason)) if reason.contains("429")));

        assert!(remote.cancel(&slow).await.unwrap());
        assert_eq!(remote.poll(&slow).await.unwrap(), TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_http_malformed_request_is_bad_request() {
        let base_url = spawn_worker(worker(8)).await;

        let response = reqwest::Client::new()
            .post(format!("{}{}", base_url, ENDPOINT_INVOKE))
            .json(&json!({"function": "chunk_index"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_http_unknown_invocation_and_health() {
        let base_url = spawn_worker(worker(4)).await;
        let remote = HttpRemoteExecutor::new(&base_url);

        let status = remote.poll(&InvocationId::new()).await.unwrap();
        assert!(matches!(status, TaskStatus::Failed { .. }));

        let health = remote.health().await.unwrap();
        assert_eq!(health.in_flight, 0);
        assert_eq!(health.max_in_flight, 4);
        assert!(health.functions.contains(&"chunk_index".to_string()));
        assert!(health.functions.contains(&"byte_length".to_string()));
    }
}
