//! In-memory per-identity presence tracking with multi-connection support.
//!
//! Presence is per-**identity**, not per-connection. A user with two browser
//! tabs is one present identity; join/leave broadcasts are gated on the
//! 0→1 and 1→0 transitions of their connection set, never on raw
//! connect/disconnect.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Outcome of registering a connection for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTransition {
    /// The identity had no live connections; the caller should broadcast a
    /// join event.
    First,
    /// Another tab for an already-present identity. No broadcast.
    Additional,
}

/// Outcome of removing a connection for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectTransition {
    /// The identity's last connection is gone; the caller should broadcast a
    /// leave event.
    Last,
    /// Other connections for this identity remain live. No broadcast.
    Remaining,
    /// The identity or connection was never registered (e.g. a connection
    /// that never authenticated). Logged no-op.
    Unknown,
}

/// Thread-safe registry mapping identity ID → live connection IDs.
pub struct PresenceRegistry {
    inner: DashMap<i64, HashSet<String>>,
    /// Number of distinct present identities. Maintained incrementally on
    /// cardinality transitions; never recomputed by scanning.
    online: AtomicUsize,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
            online: AtomicUsize::new(0),
        }
    }

    /// Register a live, authenticated connection for an identity.
    pub fn connect(&self, user_id: i64, conn_id: &str) -> ConnectTransition {
        let mut entry = self.inner.entry(user_id).or_default();
        let first = entry.is_empty();
        entry.insert(conn_id.to_string());
        if first {
            self.online.fetch_add(1, Ordering::Relaxed);
            ConnectTransition::First
        } else {
            ConnectTransition::Additional
        }
    }

    /// Remove a connection. Deletes the identity's entry when its connection
    /// set empties.
    ///
    /// The shard lock is held across the removal and the emptiness check, so
    /// a connect racing in for the same identity (tab refresh: new tab
    /// connecting while the old one disconnects) always observes either the
    /// pre-removal set or no entry at all — never a present-but-empty one.
    pub fn disconnect(&self, user_id: i64, conn_id: &str) -> DisconnectTransition {
        match self.inner.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get_mut().remove(conn_id) {
                    return DisconnectTransition::Unknown;
                }
                if occupied.get().is_empty() {
                    occupied.remove();
                    self.online.fetch_sub(1, Ordering::Relaxed);
                    DisconnectTransition::Last
                } else {
                    DisconnectTransition::Remaining
                }
            }
            Entry::Vacant(_) => DisconnectTransition::Unknown,
        }
    }

    /// Number of distinct identities with at least one live connection.
    pub fn online_count(&self) -> usize {
        self.online.load(Ordering::Relaxed)
    }

    /// Whether the identity currently has any live connection.
    pub fn is_present(&self, user_id: i64) -> bool {
        self.inner.contains_key(&user_id)
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
