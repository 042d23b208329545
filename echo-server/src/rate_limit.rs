use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::ApiError;

/// Key used when the connection address is unknown (e.g. in-process requests)
const UNKNOWN_CLIENT: &str = "unknown";

/// Fixed-window rate limiter keyed by client address.
///
/// Guards the seed trigger routes: every accepted trigger can fan out into
/// thousands of records.
#[derive(Clone)]
pub struct RateLimiter {
    // client -> (request_count, window_start)
    state: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    /// Count a request from `client`; `Err` carries the seconds until the window resets
    pub fn check(&self, client: &str) -> Result<(), u64> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();

        if state.len() > 10000 {
            state.retain(|_, (_, start)| now.duration_since(*start) < self.window_duration * 2);
        }

        match state.get_mut(client) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) < self.window_duration {
                    if *count >= self.max_requests {
                        let remaining = self.window_duration - now.duration_since(*window_start);
                        return Err(remaining.as_secs());
                    }
                    *count += 1;
                } else {
                    *window_start = now;
                    *count = 1;
                }
            }
            None => {
                state.insert(client.to_string(), (1, now));
            }
        }

        Ok(())
    }
}

/// Middleware applying [`RateLimiter`] per client IP
pub async fn rate_limit_middleware(
    axum::Extension(limiter): axum::Extension<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    if let Err(retry_in) = limiter.check(&client) {
        tracing::warn!(client = %client, "Seed trigger rate limit exceeded");
        return ApiError::TooManyRequests(format!(
            "Rate limit exceeded. Try again in {} seconds.",
            retry_in
        ))
        .into_response();
    }

    next.run(request).await
}
