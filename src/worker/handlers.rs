use super::protocol::*;
use super::service::{Rejection, WorkerService};
use crate::executor::types::*;

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

/// HTTP surface of a worker, with `service` attached as an extension.
pub fn router(service: Arc<WorkerService>) -> Router {
    Router::new()
        .route(ENDPOINT_INVOKE, post(handle_invoke))
        .route(&format!("{}/:id", ENDPOINT_STATUS), get(handle_status))
        .route(&format!("{}/:id", ENDPOINT_CANCEL), post(handle_cancel))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .layer(Extension(service))
}

pub async fn handle_invoke(
    Extension(service): Extension<Arc<WorkerService>>,
    req: Result<Json<InvokeRequest>, JsonRejection>,
) -> (StatusCode, Json<InvokeResponse>) {
    let Json(req) = match req {
        Ok(req) => req,
        Err(rejection) => {
            tracing::warn!("Malformed invocation request: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(InvokeResponse {
                    invocation_id: None,
                    error: Some(rejection.body_text()),
                }),
            );
        }
    };

    match service.submit(req.payload) {
        Ok(invocation_id) => (
            StatusCode::ACCEPTED,
            Json(InvokeResponse {
                invocation_id: Some(invocation_id),
                error: None,
            }),
        ),
        Err(rejection) => {
            let status = match rejection {
                Rejection::UnknownFunction(_) => StatusCode::NOT_FOUND,
                Rejection::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            };
            (
                status,
                Json(InvokeResponse {
                    invocation_id: None,
                    error: Some(rejection.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_status(
    Extension(service): Extension<Arc<WorkerService>>,
    Path(invocation_id_str): Path<String>,
) -> (StatusCode, Json<Option<StatusResponse>>) {
    let invocation_id = InvocationId(invocation_id_str);

    match service.invocation(&invocation_id) {
        Some(entry) => {
            tracing::debug!("Status query: {} -> {:?}", invocation_id, entry.status);
            (
                StatusCode::OK,
                Json(Some(StatusResponse {
                    invocation_id,
                    status: entry.status,
                    chunk_index: entry.chunk_index,
                    attempt: entry.attempt,
                })),
            )
        }
        None => {
            tracing::debug!("Invocation not found: {}", invocation_id);
            (StatusCode::NOT_FOUND, Json(None))
        }
    }
}

pub async fn handle_cancel(
    Extension(service): Extension<Arc<WorkerService>>,
    Path(invocation_id_str): Path<String>,
) -> (StatusCode, Json<CancelResponse>) {
    let invocation_id = InvocationId(invocation_id_str);
    let cancelled = service.cancel(&invocation_id);

    (
        StatusCode::OK,
        Json(CancelResponse {
            invocation_id,
            cancelled,
        }),
    )
}

pub async fn handle_health(
    Extension(service): Extension<Arc<WorkerService>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            in_flight: service.in_flight(),
            max_in_flight: service.max_in_flight(),
            functions: service.registry().list_functions(),
        }),
    )
}
