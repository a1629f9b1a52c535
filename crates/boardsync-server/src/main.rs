//! BoardSync Relay Server
//!
//! Development relay that sequences board operations in memory and fans them
//! out to every connection of the same board.
//!
//! ## Protocol
//!
//! Clients connect to `/api/boards/{id}/ws?userId=..&email=..` and exchange
//! JSON text frames:
//! ```json
//! { "type": "sync_request" }
//! { "type": "operation", "operation": { "id": "...", "type": "draw", ... } }
//! { "type": "cursor_update", "cursor": { "x": 100, "y": 200 } }
//! ```
//! Every accepted operation is relayed to all connections, the sender
//! included, so relay order is the same for everyone.

mod state;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use boardsync_core::presence::ActiveUser;
use boardsync_core::storage::{AppendOperation, BoardSnapshot};
use boardsync_core::sync::{ClientMessage, ServerMessage};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use state::{AppState, Relay};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Query string of the socket endpoint.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(default)]
    email: String,
    /// Accepted and ignored by the development relay.
    #[allow(dead_code)]
    token: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardsync_server=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("BOARDSYNC_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .expect("BOARDSYNC_ADDR must be a socket address");

    let app = router(Arc::new(AppState::new()));

    info!("BoardSync relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/api/boards/{{id}}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/boards/{id}", get(get_board))
        .route("/api/boards/{id}/operations", post(append_operation))
        .route("/api/boards/{id}/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "BoardSync Relay Server - Connect via WebSocket at /api/boards/{id}/ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Snapshot of a board
async fn get_board(Path(board_id): Path<String>, State(state): State<Arc<AppState>>) -> Json<BoardSnapshot> {
    Json(state.snapshot(&board_id))
}

/// Single-operation append, used by clients whose socket is down
async fn append_operation(
    Path(board_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AppendOperation>,
) -> StatusCode {
    let id = body.operation.id.clone();
    if state.append(&board_id, body.operation) {
        info!("Appended {} to board {} over HTTP", id, board_id);
    }
    StatusCode::NO_CONTENT
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(board_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let user_id = params
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("anonymous-{}", Uuid::new_v4()));
    let user = ActiveUser::new(user_id, params.email);
    ws.on_upgrade(move |socket| handle_socket(socket, state, board_id, user))
}

/// Serialize and send one message. Returns false once the peer is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    match message.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, board_id: String, user: ActiveUser) {
    let connection_id = Uuid::new_v4().to_string();
    info!("New connection {} for {} on board {}", connection_id, user.id, board_id);

    let (mut sender, mut receiver) = socket.split();
    let joined = state.connect(&board_id, &connection_id, user.clone());
    let mut board_rx = joined.rx;

    let active = ServerMessage::ActiveUsers {
        users: joined.active_users,
    };
    if send_message(&mut sender, &active).await {
        loop {
            tokio::select! {
                // Handle incoming messages from client
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::SyncRequest) => {
                                    let sync = ServerMessage::Sync {
                                        operations: state.operations(&board_id),
                                    };
                                    if !send_message(&mut sender, &sync).await {
                                        break;
                                    }
                                }
                                Ok(ClientMessage::Operation { operation }) => {
                                    state.append(&board_id, operation);
                                }
                                Ok(ClientMessage::CursorUpdate { cursor }) => {
                                    state.update_cursor(&board_id, &connection_id, cursor);
                                }
                                Err(e) => {
                                    warn!("Invalid message from {}: {}", connection_id, e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("Close from {}: {:?}", connection_id, frame);
                            break;
                        }
                        None => break,
                        Some(Ok(_)) => {} // Ignore binary/ping/pong
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", connection_id, e);
                            break;
                        }
                    }
                }

                // Handle broadcast messages from the board
                outbound = board_rx.recv() => {
                    match state.relay(&board_id, &connection_id, outbound) {
                        Relay::Send(message) => {
                            if !send_message(&mut sender, &message).await {
                                break;
                            }
                        }
                        Relay::Skip => {}
                        Relay::Stop => break,
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    state.disconnect(&board_id, &connection_id);
    info!("Connection closed: {}", connection_id);
}
