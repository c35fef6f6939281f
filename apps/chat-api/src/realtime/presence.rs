//! Connection-level presence tracking.
//!
//! Maps each user id to the set of live connection ids representing that
//! user (one user may hold several connections, e.g. multiple tabs). An
//! entry exists iff its connection set is non-empty; the disconnect that
//! empties a set deletes the entry inside the same critical section, so no
//! reader can observe an empty set.

use std::collections::HashSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Thread-safe, DashMap-backed presence registry. Mutations for one user
/// serialize on that user's shard lock via the entry API.
pub struct PresenceRegistry {
    inner: DashMap<String, HashSet<String>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Record a newly authenticated connection.
    ///
    /// Returns `true` when this is the user's first live connection — the
    /// offline→online transition the caller broadcasts.
    pub fn record_connect(&self, user_id: &str, connection_id: &str) -> bool {
        match self.inner.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().insert(connection_id.to_string());
                false
            }
            Entry::Vacant(entry) => {
                let mut connections = HashSet::new();
                connections.insert(connection_id.to_string());
                entry.insert(connections);
                true
            }
        }
    }

    /// Remove a connection.
    ///
    /// Returns `true` when this was the user's last live connection — the
    /// online→offline transition. Safe to call for users or connections
    /// that were never recorded.
    pub fn record_disconnect(&self, user_id: &str, connection_id: &str) -> bool {
        match self.inner.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(connection_id);
                if entry.get().is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner.contains_key(user_id)
    }

    /// Connection ids for a user; empty for users with no live connections.
    pub fn connections_for(&self, user_id: &str) -> HashSet<String> {
        self.inner
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Number of distinct online users.
    pub fn online_count(&self) -> usize {
        self.inner.len()
    }
}
