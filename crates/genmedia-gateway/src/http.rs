//! Request/response transport: `POST /mcp` plus `GET /health`, behind CORS.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use genmedia_config::CorsConfig;

use crate::handlers::{CallContext, McpServer};
use crate::rate_limit::{RateLimiter, rate_limit};

#[derive(Clone)]
struct HttpState {
    server: Arc<McpServer>,
}

/// Build the router. `limiter` guards `POST /mcp` only.
pub fn router(server: Arc<McpServer>, limiter: Option<Arc<RateLimiter>>, cors: &CorsConfig) -> Router {
    let mut mcp = Router::new().route("/mcp", post(mcp_handler));
    if let Some(limiter) = limiter {
        mcp = mcp.layer(axum::middleware::from_fn_with_state(limiter, rate_limit));
    }

    Router::new()
        .route("/health", get(health_handler))
        .merge(mcp)
        .with_state(HttpState { server })
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
}

pub async fn serve(
    server: Arc<McpServer>,
    limiter: Option<Arc<RateLimiter>>,
    cors: &CorsConfig,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(server, limiter, cors);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP transport listening on http://{addr}/mcp");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn mcp_handler(State(state): State<HttpState>, body: String) -> Response {
    // The handler future is dropped when the client disconnects; the guard
    // turns that into cancellation of the in-flight tool call.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let ctx = CallContext::new(cancel);

    match state.server.handle_text(&body, &ctx).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "transport": "http",
        "tools": state.server.dispatcher().names(),
    }))
}

/// CORS policy from configuration.
///
/// A `*` origin with credentials enabled mirrors the request origin, since
/// browsers refuse a literal wildcard on credentialed requests.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| match Method::from_bytes(m.trim().as_bytes()) {
            Ok(method) => Some(method),
            Err(_) => {
                warn!(method = %m, "Ignoring invalid CORS method");
                None
            }
        })
        .collect();
    let headers = header_names(&config.allowed_headers);
    let exposed = header_names(&config.exposed_headers);

    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers(exposed)
        .max_age(Duration::from_secs(config.max_age_secs));

    let wildcard = config.allowed_origins.iter().any(|o| o.trim() == "*");
    if wildcard && config.allow_credentials {
        return layer
            .allow_origin(AllowOrigin::mirror_request())
            .allow_credentials(true);
    }
    if wildcard {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    layer
        .allow_origin(origins)
        .allow_credentials(config.allow_credentials)
}

fn header_names(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|h| match HeaderName::from_bytes(h.trim().as_bytes()) {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(header = %h, "Ignoring invalid CORS header name");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::server;
    use serde_json::Value;

    async fn spawn(limiter: Option<Arc<RateLimiter>>, cors: CorsConfig) -> (SocketAddr, CancellationToken) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(server()), limiter, &cors);
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
                .unwrap();
        });
        (addr, shutdown)
    }

    #[tokio::test]
    async fn test_mcp_round_trip_and_notification() {
        let (addr, shutdown) = spawn(None, CorsConfig::default()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{addr}/mcp"))
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 5);

        let resp = client
            .post(format!("http://{addr}/mcp"))
            .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, shutdown) = spawn(None, CorsConfig::default()).await;
        let body: Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["transport"], "http");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_rate_limited_request_gets_429() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let (addr, shutdown) = spawn(Some(limiter), CorsConfig::default()).await;
        let client = reqwest::Client::new();
        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

        let first = client.post(format!("http://{addr}/mcp")).json(&ping).send().await.unwrap();
        assert_eq!(first.status(), 200);

        let second = client.post(format!("http://{addr}/mcp")).json(&ping).send().await.unwrap();
        assert_eq!(second.status(), 429);
        let body: Value = second.json().await.unwrap();
        assert_eq!(body["error"]["code"], crate::protocol::RATE_LIMITED);
        assert_eq!(body["error"]["message"], "Rate limit exceeded. Please try again later.");

        // Health is not rate limited.
        let health = client.get(format!("http://{addr}/health")).send().await.unwrap();
        assert_eq!(health.status(), 200);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_cors_preflight_mirrors_origin() {
        let (addr, shutdown) = spawn(None, CorsConfig::default()).await;
        let resp = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("http://{addr}/mcp"))
            .header("Origin", "https://studio.example")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
            .await
            .unwrap();
        let headers = resp.headers();
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "https://studio.example"
        );
        assert_eq!(headers.get("access-control-allow-credentials").unwrap(), "true");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_cors_explicit_origins() {
        let cors = CorsConfig {
            allowed_origins: vec!["https://allowed.example".into()],
            allow_credentials: false,
            ..Default::default()
        };
        let (addr, shutdown) = spawn(None, cors).await;
        let client = reqwest::Client::new();
        let allowed = client
            .get(format!("http://{addr}/health"))
            .header("Origin", "https://allowed.example")
            .send()
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "https://allowed.example"
        );

        let denied = client
            .get(format!("http://{addr}/health"))
            .header("Origin", "https://other.example")
            .send()
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
        shutdown.cancel();
    }
}
