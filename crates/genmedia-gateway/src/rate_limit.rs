//! Sliding-window rate limiting per client identity.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use genmedia_config::RateLimitConfig;
use genmedia_types::ToolError;

use crate::protocol::{JsonRpcResponse, RATE_LIMITED};

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// `None` when rate limiting is switched off.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.limit, Duration::from_secs(config.window_secs)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `identity` and report whether it is admitted.
    ///
    /// Rejected requests are not recorded, so a client that backs off regains
    /// capacity as soon as its oldest admitted request leaves the window.
    pub fn allow(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let stamps = clients.entry(identity.to_string()).or_default();
        while stamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            stamps.pop_front();
        }
        if stamps.len() < self.limit {
            stamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drop expired timestamps and forget identities left with none.
    /// Returns how many identities were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let before = clients.len();
        clients.retain(|_, stamps| {
            stamps.retain(|t| now.duration_since(*t) < self.window);
            !stamps.is_empty()
        });
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Sweep every two windows until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let period = limiter.window * 2;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = limiter.tracked_clients(), "Swept idle rate-limit entries");
                        }
                    }
                }
            }
        })
    }
}

/// Caller identity: first `X-Forwarded-For` hop, else the peer IP.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// axum middleware rejecting over-budget callers with 429 before any handler runs.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer);
    if !limiter.allow(&identity) {
        warn!(client = %identity, path = %request.uri().path(), "Rate limit exceeded");
        let body = JsonRpcResponse::error(Value::Null, RATE_LIMITED, ToolError::RateLimited.to_string());
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_limit_then_window_slides() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow("a"));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        // Other identities have their own budget.
        assert!(limiter.allow("b"));

        // The first request ages out at t=60.
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        // The two from t=10 age out at t=70.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_forgets_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.allow("a");
        limiter.allow("b");
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.allow("b");
        assert_eq!(limiter.sweep(), 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        let handle = limiter.spawn_sweeper(cancel.clone());
        limiter.allow("a");

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_client_identity() {
        let peer: SocketAddr = "10.0.0.7:5123".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, Some(peer)), "10.0.0.7");
        assert_eq!(client_identity(&headers, None), "unknown");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        assert_eq!(client_identity(&headers, Some(peer)), "203.0.113.9");
    }

    #[test]
    fn test_disabled_config() {
        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(RateLimiter::from_config(&config).is_none());
        assert!(RateLimiter::from_config(&RateLimitConfig::default()).is_some());
    }
}
