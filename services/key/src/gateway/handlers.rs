//! Route handlers. Each one decodes the request, calls the lifecycle service
//! and lets [`KeyError`]'s `IntoResponse` handle failures.

use super::GatewayState;
use crate::error::KeyError;
use crate::key::Key;
use crate::metrics;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

/// `POST /api/v1/key`
pub async fn generate(State(state): State<GatewayState>) -> Result<Json<Key>, KeyError> {
    state.service.generate().await.map(Json)
}

/// `GET /api/v1/key`
pub async fn list_unreleased(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<Key>>, KeyError> {
    state.service.list_unreleased().await.map(Json)
}

/// `POST /api/v1/key/issued`
pub async fn allocate(State(state): State<GatewayState>) -> Result<Json<Key>, KeyError> {
    state.service.allocate().await.map(Json)
}

/// `POST /api/v1/key/{id}/canceled`
pub async fn cancel(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, KeyError> {
    state.service.cancel(&id).await?;
    Ok(StatusCode::OK)
}

/// `GET /api/v1/key/{id}/verification`
pub async fn verify(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Key>, KeyError> {
    state.service.verify(&id).await.map(Json)
}

/// `GET /healthz`
pub async fn health(State(state): State<GatewayState>) -> Response {
    let store = state.service.store();
    match store.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            warn!(backend = store.backend(), error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

/// `GET /metrics`
pub async fn metrics() -> Response {
    match metrics::encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}
