//! HTTP gateway tests driven through the router with `tower::ServiceExt`.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use key_service::gateway::error::CORRELATION_ID_HEADER;
use key_service::gateway::{router, GatewayConfig};
use key_service::key::KeyGenerator;
use key_service::store::{KeyStore, MemoryKeyStore};
use key_service::{Key, KeyLifecycleService, StoreError};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(store: Arc<dyn KeyStore>) -> Router {
    let service = KeyLifecycleService::new(store, KeyGenerator::default());
    router(service, &GatewayConfig::default())
}

fn app() -> Router {
    app_with(Arc::new(MemoryKeyStore::new()))
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn text(body: &[u8]) -> &str {
    std::str::from_utf8(body).unwrap()
}

#[tokio::test]
async fn test_generate_returns_key_json() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/key").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"].as_str().unwrap().len(), 4);
    assert_eq!(json["issued"], false);
    assert_eq!(json["canceled"], false);
}

#[tokio::test]
async fn test_allocate_cancel_verify_over_http() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/api/v1/key").await;
    let generated: Key = serde_json::from_slice(&body).unwrap();

    let (status, body) = send(&app, Method::POST, "/api/v1/key/issued").await;
    assert_eq!(status, StatusCode::OK);
    let issued: Key = serde_json::from_slice(&body).unwrap();
    assert_eq!(issued.id, generated.id);
    assert!(issued.issued);

    let cancel_uri = format!("/api/v1/key/{}/canceled", issued.id);
    let (status, _) = send(&app, Method::POST, &cancel_uri).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, &cancel_uri).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(text(&body), "the key has already been canceled");

    let verify_uri = format!("/api/v1/key/{}/verification", issued.id);
    let (status, body) = send(&app, Method::GET, &verify_uri).await;
    assert_eq!(status, StatusCode::OK);
    let verified: Key = serde_json::from_slice(&body).unwrap();
    assert!(verified.issued && verified.canceled);
}

#[tokio::test]
async fn test_cancel_unissued_is_conflict() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/api/v1/key").await;
    let key: Key = serde_json::from_slice(&body).unwrap();

    let (status, body) = send(&app, Method::POST, &format!("/api/v1/key/{}/canceled", key.id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(text(&body), "the key was not issued");
}

#[tokio::test]
async fn test_not_found_responses() {
    let app = app();

    let (status, _) = send(&app, Method::POST, "/api/v1/key/issued").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/v1/key").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/v1/key/zzzz/verification").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(text(&body), "key is not found");

    let (status, _) = send(&app, Method::POST, "/api/v1/key/zzzz/canceled").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_id_is_bad_request() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/key/%20/verification").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text(&body), "empty key id");
}

#[tokio::test]
async fn test_list_unreleased_is_ordered() {
    let app = app();
    for _ in 0..5 {
        send(&app, Method::POST, "/api/v1/key").await;
    }

    let (status, body) = send(&app, Method::GET, "/api/v1/key").await;
    assert_eq!(status, StatusCode::OK);

    let keys: Vec<Key> = serde_json::from_slice(&body).unwrap();
    assert!(!keys.is_empty());
    assert!(keys.iter().all(|k| !k.issued && !k.canceled));
    assert!(keys.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/v1/key/issued").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_exposes_operation_counters() {
    let app = app();
    send(&app, Method::POST, "/api/v1/key").await;

    let (status, body) = send(&app, Method::GET, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text(&body).contains("key_service_operations_total"));
}

/// Store that fails every call the way a broken backend would.
struct BrokenStore;

#[async_trait]
impl KeyStore for BrokenStore {
    async fn insert(&self, key: &Key) -> Result<(), StoreError> {
        Err(StoreError::DuplicateId(key.id.clone()))
    }

    async fn allocate_one(&self) -> Result<Key, StoreError> {
        Err(StoreError::backend("connection refused"))
    }

    async fn cancel(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::backend("connection refused"))
    }

    async fn get(&self, _id: &str) -> Result<Key, StoreError> {
        Err(StoreError::backend("connection refused"))
    }

    async fn list_unissued(&self) -> Result<Vec<Key>, StoreError> {
        Err(StoreError::backend("connection refused"))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::backend("connection refused"))
    }

    fn backend(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn test_internal_error_hides_details() {
    let app = app_with(Arc::new(BrokenStore));
    let response = app
        .clone()
        .oneshot(Request::post("/api/v1/key").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(text(&body), "internal error");
}

#[tokio::test]
async fn test_backend_failure_is_bad_request() {
    let app = app_with(Arc::new(BrokenStore));
    let (status, body) = send(&app, Method::POST, "/api/v1/key/issued").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text(&body).contains("connection refused"));
}

#[tokio::test]
async fn test_health_reports_unavailable_store() {
    let app = app_with(Arc::new(BrokenStore));
    let (status, body) = send(&app, Method::GET, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(text(&body), "store unavailable");
}
