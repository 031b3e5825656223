//! Connection handlers for the Parley server.
//!
//! This module handles the connection lifecycle and event processing.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parley_core::{dispatch, Broadcaster, ConnectionId, RoomRegistry, Session};
use parley_protocol::codec;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The broadcaster; owns the shared room registry.
    pub broadcaster: Broadcaster,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        Self {
            broadcaster: Broadcaster::new(registry),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let websocket_path = state.config.transport.websocket_path.clone();
    Router::new()
        .route(&websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = app(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Parley relay listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.broadcaster.registry().stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.broadcaster.connection_count(),
        "rooms": stats.room_count,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    if state.broadcaster.connection_count() >= state.config.limits.max_connections {
        warn!("Connection limit reached, refusing upgrade");
        metrics::record_error("connection_limit");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    let mut session = Session::new(connection_id.clone());

    debug!(connection = %connection_id, "WebSocket connected");

    // Outbox: events fanned out to this connection by any peer's handlers
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    state.broadcaster.register(connection_id.clone(), outbox_tx);

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Event processing loop
    loop {
        tokio::select! {
            biased;

            // Drain events queued for this connection
            Some(event) = outbox_rx.recv() => {
                match codec::encode(&event) {
                    Ok(frame) => {
                        metrics::record_event("outbound");
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection = %connection_id, error = %e, "Failed to encode event");
                        metrics::record_error("encode");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&text, &mut session, &state, &connection_id);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        match std::str::from_utf8(&data) {
                            Ok(text) => handle_frame(text, &mut session, &state, &connection_id),
                            Err(_) => {
                                debug!(connection = %connection_id, "Dropping non-UTF-8 frame");
                                metrics::record_error("decode");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: no events are dispatched for this connection past this point
    state.broadcaster.unregister(&connection_id);
    session.close(state.broadcaster.registry());
    metrics::set_active_rooms(state.broadcaster.registry().room_count());

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Decode and dispatch one inbound frame.
///
/// An undecodable frame is dropped; it never terminates the connection.
fn handle_frame(frame: &str, session: &mut Session, state: &AppState, connection_id: &ConnectionId) {
    let start = Instant::now();
    metrics::record_event("inbound");

    match codec::decode(frame) {
        Ok(event) => {
            debug!(connection = %connection_id, event = event.event_name(), "Dispatching");
            let delivered = dispatch(event, session, &state.broadcaster);
            metrics::record_deliveries(delivered);
            metrics::set_active_rooms(state.broadcaster.registry().room_count());
        }
        Err(e) => {
            debug!(connection = %connection_id, error = %e, "Dropping undecodable frame");
            metrics::record_error("decode");
        }
    }

    metrics::record_dispatch_latency(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_relay() -> SocketAddr {
        let state = Arc::new(AppState::new(Config::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        client
    }

    async fn send(client: &mut Client, frame: Value) {
        client
            .send(tungstenite::Message::Text(frame.to_string()))
            .await
            .unwrap();
    }

    async fn recv(client: &mut Client) -> Value {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        serde_json::from_str(msg.to_text().unwrap()).unwrap()
    }

    async fn assert_silent(client: &mut Client) {
        let outcome = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
        assert!(outcome.is_err(), "expected no delivery, got {outcome:?}");
    }

    async fn identify(client: &mut Client, user_id: &str) {
        send(client, json!({"event": "setup", "data": {"_id": user_id}})).await;
        assert_eq!(recv(client).await, json!({"event": "connected"}));
    }

    #[tokio::test]
    async fn test_setup_is_acknowledged_to_self_only() {
        let addr = spawn_relay().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;

        identify(&mut a, "u1").await;
        assert_silent(&mut b).await;
    }

    #[tokio::test]
    async fn test_message_fans_out_excluding_sender() {
        let addr = spawn_relay().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        identify(&mut a, "u1").await;
        identify(&mut b, "u2").await;

        let message = json!({
            "chat": {"users": [{"_id": "u1"}, {"_id": "u2"}]},
            "sender": {"_id": "u1"},
            "content": "hello"
        });
        send(&mut a, json!({"event": "new message", "data": message.clone()})).await;

        assert_eq!(
            recv(&mut b).await,
            json!({"event": "message received", "data": message})
        );
        assert_silent(&mut a).await;
    }

    #[tokio::test]
    async fn test_typing_reaches_conversation_peers() {
        let addr = spawn_relay().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        identify(&mut a, "u1").await;
        identify(&mut b, "u2").await;

        send(&mut a, json!({"event": "join chat", "data": "room7"})).await;
        send(&mut b, json!({"event": "join chat", "data": "room7"})).await;

        // Events from one connection are processed in order, so once a sees
        // this message from b, b's join has completed.
        send(
            &mut b,
            json!({"event": "new message", "data": {
                "chat": {"users": [{"_id": "u1"}]},
                "sender": {"_id": "u2"}
            }}),
        )
        .await;
        recv(&mut a).await;

        send(&mut a, json!({"event": "typing", "data": "room7"})).await;

        assert_eq!(recv(&mut a).await, json!({"event": "typing"}));
        assert_eq!(recv(&mut b).await, json!({"event": "typing"}));
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_kill_the_connection() {
        let addr = spawn_relay().await;
        let mut a = connect(addr).await;

        a.send(tungstenite::Message::Text("{not json".into()))
            .await
            .unwrap();
        send(&mut a, json!({"event": "presence", "data": {}})).await;
        send(&mut a, json!({"event": "setup", "data": {}})).await;
        send(&mut a, json!({"event": "new message", "data": {"content": "no chat"}})).await;

        // The connection is still alive and working
        identify(&mut a, "u1").await;
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let addr = spawn_relay().await;
        let mut a = connect(addr).await;
        identify(&mut a, "u1").await;

        let body = http_get_health(addr).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 1);
    }

    // Plain HTTP GET without pulling in an HTTP client crate.
    async fn http_get_health(addr: SocketAddr) -> Value {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n")
                    .as_bytes(),
            )
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        serde_json::from_str(body).unwrap()
    }
}
