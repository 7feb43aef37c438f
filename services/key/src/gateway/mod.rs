//! HTTP request gateway.
//!
//! Translates HTTP requests into [`KeyLifecycleService`] calls and encodes
//! results. Routes live under `/api/v1`:
//!
//! | Route | Operation |
//! |---|---|
//! | `POST /api/v1/key` | generate |
//! | `GET /api/v1/key` | list unreleased |
//! | `POST /api/v1/key/issued` | allocate |
//! | `POST /api/v1/key/{id}/canceled` | cancel |
//! | `GET /api/v1/key/{id}/verification` | verify |
//!
//! Compatibility: earlier deployments allocated with `GET /api/v1/key/issued`
//! and verified with `GET /api/v1/key/{id}/key`. Allocation is now a `POST`
//! since it changes state (`GET` answers 405), and verification lives at
//! `/verification`. Clients of the old paths must switch.
//!
//! Layer order (outermost to innermost): tracing, CORS, timeout, then the
//! rate limiter on the API routes only.

pub mod error;
pub mod handlers;
pub mod rate_limit;

use crate::config::Config;
use crate::service::KeyLifecycleService;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use rate_limit::RateLimiter;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Gateway tuning.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Requests running longer are answered with 408
    pub request_timeout: Duration,
    /// One request token is replenished every period
    pub rate_limit_every: Duration,
    /// Maximum burst of requests
    pub rate_limit_burst: NonZeroU32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            rate_limit_every: Duration::from_micros(1),
            rate_limit_burst: NonZeroU32::new(100).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl From<&Config> for GatewayConfig {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout,
            rate_limit_every: config.rate_limit_every,
            rate_limit_burst: config.rate_limit_burst,
        }
    }
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Lifecycle service the handlers call
    pub service: KeyLifecycleService,
}

/// Build the gateway router.
pub fn router(service: KeyLifecycleService, config: &GatewayConfig) -> Router {
    let limiter: Arc<RateLimiter> =
        rate_limit::build_limiter(config.rate_limit_every, config.rate_limit_burst);

    let api = Router::new()
        .route(
            "/api/v1/key",
            post(handlers::generate).get(handlers::list_unreleased),
        )
        .route("/api/v1/key/issued", post(handlers::allocate))
        .route("/api/v1/key/:id/canceled", post(handlers::cancel))
        .route("/api/v1/key/:id/verification", get(handlers::verify))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));

    Router::new()
        .merge(api)
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors())
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .with_state(GatewayState { service })
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE])
}
