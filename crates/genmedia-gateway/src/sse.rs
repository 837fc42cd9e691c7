//! Server-push transport: `GET /sse` opens a session stream, `POST /message`
//! feeds it requests whose responses come back over the stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::handlers::{CallContext, McpServer};
use crate::rate_limit::{RateLimiter, rate_limit};

struct Session {
    outbound: mpsc::UnboundedSender<Value>,
    cancel: CancellationToken,
}

pub struct SseState {
    server: Arc<McpServer>,
    sessions: Mutex<HashMap<String, Session>>,
    /// Prefix for the advertised message endpoint; empty means a relative path.
    base_url: String,
}

impl SseState {
    pub fn new(server: Arc<McpServer>, base_url: Option<String>) -> Self {
        Self {
            server,
            sessions: Mutex::new(HashMap::new()),
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(&self) -> (String, mpsc::UnboundedReceiver<Value>) {
        let id = Uuid::new_v4().to_string();
        let (outbound, rx) = mpsc::unbounded_channel();
        self.lock().insert(
            id.clone(),
            Session {
                outbound,
                cancel: CancellationToken::new(),
            },
        );
        info!(session = %id, "SSE session opened");
        (id, rx)
    }

    fn close(&self, id: &str) {
        if let Some(session) = self.lock().remove(id) {
            session.cancel.cancel();
            info!(session = %id, "SSE session closed");
        }
    }
}

/// Removes its session when the event stream is dropped.
struct SessionGuard {
    state: Arc<SseState>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.close(&self.id);
    }
}

/// Build the router. `limiter` guards `POST /message` only.
pub fn router(state: Arc<SseState>, limiter: Option<Arc<RateLimiter>>) -> Router {
    let mut message = Router::new().route("/message", post(message_handler));
    if let Some(limiter) = limiter {
        message = message.layer(axum::middleware::from_fn_with_state(limiter, rate_limit));
    }

    Router::new()
        .route("/sse", get(sse_handler))
        .route("/health", get(health_handler))
        .merge(message)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    state: Arc<SseState>,
    limiter: Option<Arc<RateLimiter>>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state, limiter);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("SSE transport listening on http://{addr}/sse");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn sse_handler(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.open();
    let endpoint = format!("{}/message?sessionId={id}", state.base_url);
    let guard = SessionGuard {
        state: state.clone(),
        id,
    };

    let first = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint))
    });
    // The guard rides along in the stream state so the session closes with it.
    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let message = rx.recv().await?;
        let event = Event::default().event("message").data(message.to_string());
        Some((Ok(event), (rx, guard)))
    });
    Sse::new(first.chain(messages)).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn message_handler(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let (outbound, cancel) = {
        let sessions = state.lock();
        match sessions.get(&query.session_id) {
            Some(session) => (session.outbound.clone(), session.cancel.child_token()),
            None => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": format!("unknown session: {}", query.session_id)})),
                )
                    .into_response();
            }
        }
    };

    let server = state.server.clone();
    let session = query.session_id;
    tokio::spawn(async move {
        let ctx = CallContext::new(cancel).with_notifier(outbound.clone());
        if let Some(response) = server.handle_text(&body, &ctx).await {
            if outbound.send(response.to_value()).is_err() {
                debug!(session = %session, "Session closed before response was delivered");
            }
        }
    });
    StatusCode::ACCEPTED.into_response()
}

async fn health_handler(State(state): State<Arc<SseState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "transport": "sse",
        "sessions": state.session_count(),
    }))
}
