//! TTL cache of verified identities.
//!
//! Re-verification of a token for an already-seen identity is cheap; the real
//! cost in a full deployment is the profile lookup behind it. The cache is
//! created at process start, owned by the verifier, and dropped at shutdown.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::Identity;

struct CachedIdentity {
    identity: Identity,
    expires_at: Instant,
}

/// Identity-keyed cache with a fixed time-to-live.
pub struct IdentityCache {
    inner: DashMap<i64, CachedIdentity>,
    ttl: Duration,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Look up a fresh entry. Expired entries are removed on the way out.
    pub fn get(&self, id: i64) -> Option<Identity> {
        let expired = match self.inner.get(&id) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.identity.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.inner.remove_if(&id, |_, e| e.expires_at <= Instant::now());
        }
        None
    }

    /// Store an identity, resetting its expiry to now + TTL.
    pub fn insert(&self, identity: Identity) {
        self.inner.insert(
            identity.id,
            CachedIdentity {
                identity,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}
