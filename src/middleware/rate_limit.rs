use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;

use crate::state::AppState;

/// Fixed-window, per-IP rate limiter.
pub struct RateLimiter {
    /// Map from IP to (window_start, request_count)
    requests: DashMap<IpAddr, (Instant, u32)>,
    /// Maximum requests per window
    max_requests: u32,
    /// Window length
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check if a request from this IP is allowed.
    /// Returns Ok(()) if allowed, Err(remaining_wait_time) if rate limited.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();

        let mut entry = self.requests.entry(ip).or_insert((now, 0));
        let (window_start, count) = entry.value_mut();

        // Start a new window once the old one has passed
        if now.duration_since(*window_start) >= self.window {
            *window_start = now;
            *count = 1;
            return Ok(());
        }

        if *count >= self.max_requests {
            let wait_time = self.window - now.duration_since(*window_start);
            return Err(wait_time);
        }

        *count += 1;
        Ok(())
    }

    /// Drop entries whose window ended long ago.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let ttl = self.window.saturating_mul(2);
        self.requests
            .retain(|_, (window_start, _)| now.duration_since(*window_start) < ttl);
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

/// Client address as seen by the listener; loopback when the router runs
/// without connect info (tests).
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);

    match state.rate_limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(wait_time) => {
            tracing::warn!(client = %ip, "Rate limit exceeded");
            let retry_after = wait_time.as_secs().max(1).to_string();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after)],
                Json(json!({
                    "error": "Too many requests from this IP, please try again later."
                })),
            )
                .into_response()
        }
    }
}
