use crate::message::Frame;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;

// Type alias for user IDs (identities are opaque strings)
pub type UserId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection information (no redundant connection_id)
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub user_id: UserId,
    pub sender: UnboundedSender<Frame>,
    pub connected_at: DateTime<Utc>,
}

/// Result of registering a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub connection_id: ConnectionId,
    /// True when this is the identity's first live connection and it was not
    /// already considered online (a reconnect inside the grace period is not).
    pub came_online: bool,
}

/// High-performance connection registry with dual indices for O(1) lookups.
///
/// The user index doubles as the presence table. An identity that has an
/// entry is considered announced-online; an entry with an empty connection
/// set means the last connection closed and the offline transition has not
/// been settled yet. All presence decisions for one identity are taken under
/// that identity's map entry, so unrelated identities never contend.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: fast lookup by user_id for message routing - O(1)
    user_index: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    /// Register a new connection - O(1)
    pub fn register(&self, user_id: UserId, sender: UnboundedSender<Frame>) -> Registration {
        let connection_id = ConnectionId::new();

        // Insert into primary storage first so routing never sees a dangling id
        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                user_id: user_id.clone(),
                sender,
                connected_at: Utc::now(),
            },
        );

        let mut came_online = false;
        self.user_index
            .entry(user_id)
            .or_insert_with(|| {
                came_online = true;
                HashSet::new()
            })
            .insert(connection_id.clone());

        Registration {
            connection_id,
            came_online,
        }
    }

    /// Unregister a connection - O(1)
    ///
    /// Returns the owning identity when this was its last live connection. The
    /// identity stays in the index until [`ConnectionRegistry::settle_offline`]
    /// is called for it.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let (_, info) = self.connections.remove(connection_id)?;

        let mut entry = self.user_index.get_mut(&info.user_id)?;
        entry.remove(connection_id);

        if entry.is_empty() {
            Some(info.user_id)
        } else {
            None
        }
    }

    /// Completes an offline transition. Returns true only if the identity still
    /// has no live connection, in which case it is dropped from the index and
    /// the caller should announce it offline.
    pub fn settle_offline(&self, user_id: &str) -> bool {
        self.user_index
            .remove_if(user_id, |_, connection_ids| connection_ids.is_empty())
            .is_some()
    }

    /// True iff the identity holds at least one live connection.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.user_index
            .get(user_id)
            .is_some_and(|connection_ids| !connection_ids.is_empty())
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.user_index
            .get(user_id)
            .map_or(0, |connection_ids| connection_ids.len())
    }

    pub fn connection_info(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections
            .get(connection_id)
            .map(|info| info.value().clone())
    }

    /// Send message to specific user - O(1) lookup + O(k) send where k = user's connections
    ///
    /// A user with no live connection is not an error; the frame is dropped.
    pub fn send_to_user(&self, user_id: &str, frame: &Frame) -> usize {
        let mut delivered = 0;

        if let Some(connection_ids) = self.user_index.get(user_id) {
            for conn_id in connection_ids.iter() {
                if let Some(info) = self.connections.get(conn_id) {
                    match info.sender.send(frame.clone()) {
                        Ok(()) => delivered += 1,
                        Err(e) => warn!(
                            "Failed to send event to connection {}: {}. Connection will be cleaned up.",
                            conn_id.as_str(),
                            e
                        ),
                    }
                }
            }
        }

        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
