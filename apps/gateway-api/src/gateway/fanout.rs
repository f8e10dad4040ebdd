//! Broadcast hub for dispatching gateway events to connected sessions.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters frames locally by scope, resolving room membership
//! at delivery time. All frames flow through one channel, so fanout events
//! observe a total order.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::ServerEvent;
use super::rooms::RoomRegistry;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip frames (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// Who should receive a frame. Sender-only frames (welcome, message ack)
/// bypass the hub and are written straight to the session's sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every connection, the originator included.
    All,
    /// Every connection except the named one.
    AllExcept(String),
    /// Connections that are members of the room when the frame arrives.
    Room(String),
}

/// A frame dispatched to all connected sessions for local filtering.
#[derive(Debug, Clone)]
pub struct BroadcastFrame {
    pub scope: Scope,
    pub event: ServerEvent,
}

impl BroadcastFrame {
    /// Whether the frame should be delivered to the given connection.
    pub fn delivers_to(&self, conn_id: &str, rooms: &RoomRegistry) -> bool {
        match &self.scope {
            Scope::All => true,
            Scope::AllExcept(excluded) => excluded != conn_id,
            Scope::Room(room_id) => rooms.contains(room_id, conn_id),
        }
    }
}

/// The global broadcast hub. Cloneable — store in AppState.
#[derive(Clone)]
pub struct GatewayBroadcast {
    sender: broadcast::Sender<Arc<BroadcastFrame>>,
}

impl GatewayBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each gateway session should call
    /// this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastFrame>> {
        self.sender.subscribe()
    }

    /// Dispatch a frame to all connected sessions.
    pub fn dispatch(&self, scope: Scope, event: ServerEvent) {
        // send() returns Err if there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(BroadcastFrame { scope, event }));
    }
}

impl Default for GatewayBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::events::EventName;
    use super::*;

    fn frame(scope: Scope) -> BroadcastFrame {
        BroadcastFrame {
            scope,
            event: ServerEvent::new(EventName::MESSAGE, json!({})),
        }
    }

    #[test]
    fn all_scope_includes_everyone() {
        let rooms = RoomRegistry::new();
        assert!(frame(Scope::All).delivers_to("conn_a", &rooms));
        assert!(frame(Scope::All).delivers_to("conn_b", &rooms));
    }

    #[test]
    fn all_except_excludes_only_the_originator() {
        let rooms = RoomRegistry::new();
        let f = frame(Scope::AllExcept("conn_a".to_string()));
        assert!(!f.delivers_to("conn_a", &rooms));
        assert!(f.delivers_to("conn_b", &rooms));
    }

    #[test]
    fn room_scope_resolves_membership_at_delivery_time() {
        let rooms = RoomRegistry::new();
        rooms.join("lobby", "conn_a");

        let f = frame(Scope::Room("lobby".to_string()));
        assert!(f.delivers_to("conn_a", &rooms));
        assert!(!f.delivers_to("conn_b", &rooms));

        // Joining after the frame was built still counts: membership is
        // checked when the frame reaches the session.
        rooms.join("lobby", "conn_b");
        assert!(f.delivers_to("conn_b", &rooms));
    }

    #[tokio::test]
    async fn dispatch_reaches_subscribers() {
        let hub = GatewayBroadcast::new();
        let mut rx = hub.subscribe();
        hub.dispatch(Scope::All, ServerEvent::new(EventName::USER_COUNT, json!({"count": 1})));

        let received = rx.recv().await.expect("frame");
        assert_eq!(received.scope, Scope::All);
        assert_eq!(received.event.event, "user-count");
    }

    #[tokio::test]
    async fn dispatch_without_subscribers_is_fine() {
        let hub = GatewayBroadcast::new();
        hub.dispatch(Scope::All, ServerEvent::new(EventName::USER_COUNT, json!({"count": 0})));
    }
}
