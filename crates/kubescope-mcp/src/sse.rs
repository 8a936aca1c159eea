//! SSE transport for MCP server
//!
//! Implements MCP over HTTP with SSE for server-to-client events. Every
//! committed graph is announced to connected clients as a
//! `notifications/graph/changed` message. Tool results are returned only
//! to the client that posted the request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::transport::JsonRpcRequest;
use crate::McpServer;

/// Maximum request body size (1MB)
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// SSE transport state
pub struct SseState {
    server: Arc<McpServer>,
    event_tx: broadcast::Sender<String>,
    auth_token: Option<String>,
}

impl SseState {
    pub fn new(server: Arc<McpServer>, auth_token: Option<String>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            server,
            event_tx,
            auth_token,
        }
    }

    /// Forward graph commits to SSE clients until the topology goes away
    fn spawn_graph_forwarder(&self) {
        let mut changes = self.server.graph_changes();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let generation = *changes.borrow_and_update();
                let notification = McpServer::graph_changed_notification(generation);
                if let Ok(json) = serde_json::to_string(&notification) {
                    // No subscribers is fine
                    let _ = event_tx.send(json);
                }
            }
        });
    }
}

/// Auth middleware - validates Bearer token if configured
async fn auth_middleware(
    State(state): State<Arc<SseState>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    // No token configured: localhost mode
    let Some(expected_token) = &state.auth_token else {
        return next.run(request).await;
    };

    let auth_header = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    match auth_header.and_then(|auth| auth.strip_prefix("Bearer ")) {
        Some(token) if token == expected_token => next.run(request).await,
        Some(_) => (StatusCode::UNAUTHORIZED, "Invalid token").into_response(),
        None => (StatusCode::UNAUTHORIZED, "Missing or invalid Authorization header").into_response(),
    }
}

/// Create the SSE router. Must be called inside a tokio runtime.
pub fn create_sse_router(server: Arc<McpServer>, auth_token: Option<String>) -> Router {
    let state = Arc::new(SseState::new(server, auth_token));
    state.spawn_graph_forwarder();
    router_with_state(state)
}

fn router_with_state(state: Arc<SseState>) -> Router {
    // Only localhost origins
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://localhost:8080"),
            HeaderValue::from_static("http://127.0.0.1:8080"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "server": "kubescope-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// SSE endpoint for server-to-client events
async fn sse_handler(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let initial_msg = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "endpoint",
        "params": {
            "endpoint": "/message"
        }
    })
    .to_string();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("endpoint").data(initial_msg));

        loop {
            match rx.recv().await {
                Ok(msg) => {
                    yield Ok(Event::default().event("message").data(msg));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE client lagged behind by {} messages", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Message endpoint for client requests
async fn message_handler(State(state): State<Arc<SseState>>, Json(request): Json<JsonRpcRequest>) -> Response {
    tracing::debug!("Received SSE request: {:?}", request.method);

    match state.server.handle_request_public(request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Run the SSE server
pub async fn run_sse_server(server: Arc<McpServer>, addr: &str, auth_token: Option<String>) -> anyhow::Result<()> {
    let router = create_sse_router(server, auth_token);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("MCP SSE server listening on {}", addr);
    tracing::info!("  SSE endpoint: http://{}/sse", addr);
    tracing::info!("  Message endpoint: http://{}/message", addr);
    tracing::info!("  Health check: http://{}/health", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
