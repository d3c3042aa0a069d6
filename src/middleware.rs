use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use poem::http::StatusCode;
use poem::{Endpoint, IntoResponse, Middleware, Request, Response, Result};

/// Per-request deadline over the whole route tree; the configured value
/// comes from `REQUEST_TIMEOUT_MS`.
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<E: Endpoint> Middleware<E> for Timeout {
    type Output = TimeoutEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        TimeoutEndpoint {
            inner: ep,
            duration: self.duration,
        }
    }
}

pub struct TimeoutEndpoint<E> {
    inner: E,
    duration: Duration,
}

impl<E: Endpoint> Endpoint for TimeoutEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Response> {
        match tokio::time::timeout(self.duration, self.inner.call(req)).await {
            Ok(result) => result.map(IntoResponse::into_response),
            Err(_) => Ok(Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body("Request timed out")),
        }
    }
}

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const RATE_LIMIT_MESSAGE: &str =
    "Please slow down your requests! This is a shared public endpoint.";

/// Admission control for the chart-rendering endpoints: a fixed
/// one-minute window per client, keyed by the forwarded-for header when
/// present. Disabled unless a budget is configured.
#[derive(Clone)]
pub struct RateLimit {
    max_per_min: Option<u32>,
    windows: Arc<Mutex<HashMap<String, (Instant, u32)>>>,
}

impl RateLimit {
    pub fn new(max_per_min: Option<u32>) -> Self {
        if let Some(max) = max_per_min {
            tracing::info!("Enabling rate limit: {}", max);
        }
        Self {
            max_per_min,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn admit(&self, key: &str) -> bool {
        let Some(max) = self.max_per_min else {
            return true;
        };
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= RATE_LIMIT_WINDOW {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= max
    }
}

impl<E: Endpoint> Middleware<E> for RateLimit {
    type Output = RateLimitEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        RateLimitEndpoint {
            inner: ep,
            limit: self.clone(),
        }
    }
}

pub struct RateLimitEndpoint<E> {
    inner: E,
    limit: RateLimit,
}

impl<E: Endpoint> Endpoint for RateLimitEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Response> {
        let key = client_key(&req);
        if !self.limit.admit(&key) {
            tracing::info!("User hit rate limit! {}", key);
            return Ok(Response::builder()
                .status(StatusCode::TOO_MANY_REQUESTS)
                .body(RATE_LIMIT_MESSAGE));
        }
        self.inner.call(req).await.map(IntoResponse::into_response)
    }
}

fn client_key(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| req.remote_addr().to_string())
}
