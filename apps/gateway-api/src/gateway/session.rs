//! Per-connection gateway session state.

use crate::auth::Identity;

/// State for a single admitted WebSocket connection.
///
/// A session only exists once authentication has completed — it cannot be
/// constructed without an identity, so "admitted but anonymous" is
/// unrepresentable.
pub struct GatewaySession {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    identity: Identity,
}

impl GatewaySession {
    pub fn new(connection_id: String, identity: Identity) -> Self {
        Self {
            connection_id,
            identity,
        }
    }

    /// The identity attached at admission. Immutable for the life of the
    /// connection.
    pub fn current_identity(&self) -> &Identity {
        &self.identity
    }
}
