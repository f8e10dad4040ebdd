//! Application event dispatch: connection lifecycle and inbound frames.
//!
//! Every function here runs with an admitted session — the authenticator has
//! already attached the identity, so handlers only decide scope and payload.

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::AppState;

use super::events::{
    ClientEvent, EventName, JoinRoomPayload, MessagePayload, RoomMessagePayload, ServerEvent,
};
use super::fanout::Scope;
use super::presence::{ConnectTransition, DisconnectTransition};
use super::session::GatewaySession;

/// Greeting sent to every freshly admitted connection.
const WELCOME_TEXT: &str = "Welcome to the chat!";

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Register the admitted connection and announce it.
///
/// `user-joined` and `user-count` are broadcast only on the identity's first
/// live connection — a second tab for an already-present user stays silent.
/// Returns the `welcome` frame for the sender; the current count rides along
/// so late tabs still learn it.
pub fn handle_connect(state: &AppState, session: &GatewaySession) -> ServerEvent {
    let identity = session.current_identity();
    let transition = state
        .presence
        .connect(identity.id, &session.connection_id);
    let count = state.presence.online_count();

    if transition == ConnectTransition::First {
        state.broadcast.dispatch(
            Scope::AllExcept(session.connection_id.clone()),
            ServerEvent::new(
                EventName::USER_JOINED,
                json!({
                    "clientId": session.connection_id,
                    "userId": identity.id,
                    "username": identity.username,
                    "timestamp": now_rfc3339(),
                }),
            ),
        );
        state.broadcast.dispatch(
            Scope::All,
            ServerEvent::new(EventName::USER_COUNT, json!({ "count": count })),
        );
    }

    tracing::info!(
        conn_id = %session.connection_id,
        user_id = identity.id,
        username = %identity.username,
        ?transition,
        "client connected"
    );

    ServerEvent::new(
        EventName::WELCOME,
        json!({
            "message": WELCOME_TEXT,
            "clientId": session.connection_id,
            "userId": identity.id,
            "username": identity.username,
            "count": count,
        }),
    )
}

/// Deregister a closed connection and announce the departure when it was the
/// identity's last one.
pub fn handle_disconnect(state: &AppState, session: &GatewaySession) {
    let identity = session.current_identity();
    state.rooms.leave_all(&session.connection_id);

    match state
        .presence
        .disconnect(identity.id, &session.connection_id)
    {
        DisconnectTransition::Last => {
            state.broadcast.dispatch(
                Scope::All,
                ServerEvent::new(
                    EventName::USER_LEFT,
                    json!({
                        "clientId": session.connection_id,
                        "userId": identity.id,
                        "timestamp": now_rfc3339(),
                    }),
                ),
            );
            state.broadcast.dispatch(
                Scope::All,
                ServerEvent::new(
                    EventName::USER_COUNT,
                    json!({ "count": state.presence.online_count() }),
                ),
            );
        }
        DisconnectTransition::Remaining => {}
        DisconnectTransition::Unknown => {
            tracing::warn!(
                conn_id = %session.connection_id,
                user_id = identity.id,
                "disconnect for an unregistered connection"
            );
        }
    }

    tracing::info!(
        conn_id = %session.connection_id,
        user_id = identity.id,
        "client disconnected"
    );
}

/// Dispatch one inbound application frame. Returns a frame to send directly
/// back to the sender, if any.
pub fn handle_event(
    state: &AppState,
    session: &GatewaySession,
    event: ClientEvent,
) -> Option<ServerEvent> {
    match event {
        ClientEvent::Identify(_) => {
            // Protocol error: already admitted. Drop, keep the connection.
            tracing::warn!(conn_id = %session.connection_id, "identify after admission dropped");
            None
        }
        ClientEvent::Message(payload) => handle_message(state, session, payload),
        ClientEvent::Typing => {
            handle_typing(state, session);
            None
        }
        ClientEvent::JoinRoom(payload) => {
            handle_join_room(state, session, payload);
            None
        }
        ClientEvent::RoomMessage(payload) => {
            handle_room_message(state, session, payload);
            None
        }
    }
}

fn handle_message(
    state: &AppState,
    session: &GatewaySession,
    payload: MessagePayload,
) -> Option<ServerEvent> {
    let identity = session.current_identity();
    tracing::debug!(conn_id = %session.connection_id, "chat message");

    state.broadcast.dispatch(
        Scope::All,
        ServerEvent::new(
            EventName::MESSAGE,
            json!({
                "clientId": session.connection_id,
                "userId": identity.id,
                "username": identity.username,
                "text": payload.text,
                "timestamp": now_rfc3339(),
            }),
        ),
    );

    // Acknowledgement goes to the sender only, never broadcast.
    Some(ServerEvent::new(
        EventName::MESSAGE_ACK,
        json!({
            "success": true,
            "messageId": state.snowflake.generate(),
        }),
    ))
}

fn handle_typing(state: &AppState, session: &GatewaySession) {
    let identity = session.current_identity();
    state.broadcast.dispatch(
        Scope::AllExcept(session.connection_id.clone()),
        ServerEvent::new(
            EventName::USER_TYPING,
            json!({
                "clientId": session.connection_id,
                "userId": identity.id,
                "username": identity.username,
            }),
        ),
    );
}

fn handle_join_room(state: &AppState, session: &GatewaySession, payload: JoinRoomPayload) {
    let identity = session.current_identity();
    let newly_joined = state.rooms.join(&payload.room_id, &session.connection_id);
    if !newly_joined {
        // Idempotent re-join; no duplicate announcement.
        return;
    }

    tracing::debug!(
        conn_id = %session.connection_id,
        room_id = %payload.room_id,
        "joined room"
    );

    state.broadcast.dispatch(
        Scope::Room(payload.room_id.clone()),
        ServerEvent::new(
            EventName::ROOM_MESSAGE,
            json!({
                "type": "system",
                "text": format!("{} joined {}", identity.username, payload.room_id),
                "roomId": payload.room_id,
            }),
        ),
    );
}

fn handle_room_message(state: &AppState, session: &GatewaySession, payload: RoomMessagePayload) {
    let identity = session.current_identity();
    state.broadcast.dispatch(
        Scope::Room(payload.room_id.clone()),
        ServerEvent::new(
            EventName::ROOM_MESSAGE,
            json!({
                "type": "message",
                "clientId": session.connection_id,
                // The attached identity is authoritative; the payload's
                // username field is ignored.
                "username": identity.username,
                "text": payload.text,
                "roomId": payload.room_id,
                "timestamp": now_rfc3339(),
            }),
        ),
    );
}
