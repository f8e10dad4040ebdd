//! WebSocket upgrade handler, admission gate, and per-connection event loop.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time;

use crate::auth::{select_token, HandshakeTokens};
use crate::AppState;

use super::events::{ClientEvent, IdentifyPayload, ServerEvent};
use super::handler;
use super::session::GatewaySession;

/// Close codes (4000-range for application-level).
const CLOSE_INVALID_FRAME: u16 = 4000;
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;
const CLOSE_HANDSHAKE_TIMEOUT: u16 = 4009;

/// Timeout for receiving the identify frame after connection (seconds).
const IDENTIFY_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Capture the upgrade-request carriers before the socket is handed off.
    let handshake = HandshakeTokens {
        query: params.get("token").cloned(),
        header: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };
    ws.on_upgrade(move |socket| handle_connection(socket, state, handshake))
}

async fn handle_connection(socket: WebSocket, state: AppState, handshake: HandshakeTokens) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: the first frame must be identify, within the timeout. Nothing
    // is registered for this connection until admission completes.
    let payload = match await_identify(&mut ws_rx).await {
        Ok(payload) => payload,
        Err((code, reason)) => {
            tracing::debug!(%reason, "admission handshake failed");
            let _ = send_close(&mut ws_tx, code, reason).await;
            return;
        }
    };

    // Step 2: pick the token carrier and verify. Rejection closes the socket
    // before any presence or room state exists.
    let Some(token) = select_token(payload.token.as_deref(), &handshake) else {
        tracing::debug!("no credential in any carrier");
        let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "No credential provided").await;
        return;
    };

    let identity = match state.verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(%e, "credential verification failed");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "Invalid credential").await;
            return;
        }
    };

    // Step 3: admitted. Subscribe before announcing so this session cannot
    // miss frames that race with its own join broadcast.
    let broadcast_rx = state.broadcast.subscribe();
    let conn_id = gateway_common::id::prefixed_ulid(gateway_common::id::prefix::CONNECTION);
    let session = GatewaySession::new(conn_id, identity);

    let welcome = handler::handle_connect(&state, &session);
    if send_event(&mut ws_tx, &welcome).await.is_ok() {
        run_session(&state, &session, &mut ws_tx, ws_rx, broadcast_rx).await;
    }

    // Step 4: deregister, whether the peer closed cleanly or vanished.
    handler::handle_disconnect(&state, &session);
}

/// Wait for the identify frame. Pre-admission protocol violations map to a
/// close code and reason for the caller to send.
async fn await_identify(
    ws_rx: &mut SplitStream<WebSocket>,
) -> Result<IdentifyPayload, (u16, &'static str)> {
    let result = time::timeout(Duration::from_secs(IDENTIFY_TIMEOUT_SECS), async {
        while let Some(msg) = ws_rx.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(?e, "ws read error during identify");
                    return Err((CLOSE_INVALID_FRAME, "Read error"));
                }
            };

            let text = match msg {
                Message::Text(t) => t,
                Message::Close(_) => return Err((CLOSE_INVALID_FRAME, "Client closed")),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            return match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::Identify(payload)) => Ok(payload),
                Ok(_) => Err((CLOSE_NOT_AUTHENTICATED, "Expected identify")),
                Err(_) => Err((CLOSE_INVALID_FRAME, "Invalid frame")),
            };
        }
        Err((CLOSE_INVALID_FRAME, "Connection closed before identify"))
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_timeout) => Err((CLOSE_HANDSHAKE_TIMEOUT, "Handshake timeout")),
    }
}

/// Main session event loop: read client frames, forward scoped broadcasts.
async fn run_session(
    state: &AppState,
    session: &GatewaySession,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<std::sync::Arc<super::fanout::BroadcastFrame>>,
) {
    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                // Protocol error: drop the frame, keep the
                                // connection.
                                tracing::debug!(
                                    ?e,
                                    conn_id = %session.connection_id,
                                    "unparseable frame dropped"
                                );
                                continue;
                            }
                        };

                        if let Some(reply) = handler::handle_event(state, session, event) {
                            if send_event(ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, conn_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Scoped frame from the fanout hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(frame) => {
                        if !frame.delivers_to(&session.connection_id, &state.rooms) {
                            continue;
                        }
                        if send_event(ws_tx, &frame.event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            conn_id = %session.connection_id,
                            skipped = n,
                            "session lagged behind broadcast"
                        );
                        // Continue — the missed frames are dropped.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(event.to_json().into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
