//! Room membership: named broadcast scopes a connection can join.
//!
//! Membership is connection-scoped, not identity-scoped — two tabs of the
//! same user joining a room are tracked independently. Nothing is persisted;
//! an absent room and an empty room are equivalent.

use std::collections::HashSet;

use dashmap::DashMap;

/// Thread-safe registry mapping room ID → member connection IDs.
pub struct RoomRegistry {
    inner: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Add a connection to a room. Idempotent; returns whether the
    /// membership was newly created.
    pub fn join(&self, room_id: &str, conn_id: &str) -> bool {
        self.inner
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id.to_string())
    }

    /// Whether the connection is a member of the room right now. Room-scoped
    /// delivery consults this at delivery time.
    pub fn contains(&self, room_id: &str, conn_id: &str) -> bool {
        self.inner
            .get(room_id)
            .is_some_and(|members| members.contains(conn_id))
    }

    /// Remove the connection from every room it joined. Empty rooms are
    /// dropped along the way.
    pub fn leave_all(&self, conn_id: &str) {
        self.inner.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }

    /// Number of members currently in the room.
    pub fn member_count(&self, room_id: &str) -> usize {
        self.inner.get(room_id).map_or(0, |members| members.len())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
