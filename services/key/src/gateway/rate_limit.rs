//! Global request rate limiting for the API routes.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Unkeyed limiter shared by every request.
pub type RateLimiter = GovRateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Build a limiter replenishing one request every `every`, up to `burst`.
///
/// A zero period replenishes as fast as the clock allows.
#[must_use]
pub fn build_limiter(every: Duration, burst: NonZeroU32) -> Arc<RateLimiter> {
    let quota = Quota::with_period(every)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(burst);
    Arc::new(GovRateLimiter::direct(quota))
}

/// Reject the request with 429 when the limiter is exhausted.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check().is_err() {
        warn!(path = %request.uri().path(), "Rate limit exceeded");
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }
    next.run(request).await
}
