use crate::connection::{ConnectionId, ConnectionRegistry, Registration, UserId};
use crate::message::{EventType, Frame, Message as SseMessage, MessageScope};
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Register a new connection. The returned registration says whether the
    /// user just transitioned to online.
    pub fn register_connection(&self, user_id: UserId, sender: UnboundedSender<Frame>) -> Registration {
        let registration = self.registry.register(user_id.clone(), sender);
        info!(
            "Registered SSE connection {} for user {user_id} ({} open)",
            registration.connection_id.as_str(),
            self.registry.connection_count(&user_id)
        );
        registration
    }

    /// Unregister a connection by ID. Returns the user if this was their last
    /// live connection.
    pub fn unregister_connection(&self, connection_id: &ConnectionId) -> Option<UserId> {
        match self.registry.connection_info(connection_id) {
            Some(info) => info!(
                "Unregistering SSE connection {} for user {} after {}s",
                connection_id.as_str(),
                info.user_id,
                (chrono::Utc::now() - info.connected_at).num_seconds()
            ),
            None => debug!("SSE connection {} is already gone", connection_id.as_str()),
        }
        self.registry.unregister(connection_id)
    }

    /// Finish an offline transition started by the last unregister. Returns
    /// false if the user reconnected in the meantime.
    pub fn settle_offline(&self, user_id: &str) -> bool {
        let settled = self.registry.settle_offline(user_id);
        if settled {
            debug!("User {user_id} is now offline");
        }
        settled
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.registry.is_online(user_id)
    }

    /// Send a message based on its scope
    pub fn send_message(&self, message: SseMessage) {
        let event_type = message.event.event_type();

        let data = match serde_json::to_string(&message.event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize SSE event: {e}");
                return;
            }
        };

        let frame = Frame { event_type, data };

        match message.scope {
            MessageScope::User { user_id } => {
                self.registry.send_to_user(&user_id, &frame);
            }
            MessageScope::Users { user_ids } => {
                for user_id in user_ids {
                    self.registry.send_to_user(&user_id, &frame);
                }
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
