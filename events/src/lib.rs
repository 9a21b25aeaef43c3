//! Event system infrastructure for Parley.
//!
//! This crate provides the event system that enables loose coupling between
//! domain logic and infrastructure concerns (like realtime SSE delivery).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies. Entity data is carried as serialized JSON values.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = Uuid;

/// Identities are opaque strings; matches `entity::UserId`.
pub type UserId = String;

/// Domain events that represent business-level changes in the system.
/// These events are emitted after the corresponding write has been committed.
///
/// Events include the identities to notify. The domain layer is responsible
/// for determining recipients; handlers only route.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A message was persisted. The receiver gets the message itself and the
    /// sender gets an acknowledgement on all of their open sessions.
    MessageCreated {
        /// Complete serialized message entity.
        message: Value,
        sender_id: UserId,
        receiver_id: UserId,
    },
    /// `reader_id` saw messages sent by `counterpart_id`. Only emitted when at
    /// least one message actually flipped to read.
    MessagesRead {
        reader_id: UserId,
        counterpart_id: UserId,
        message_ids: Vec<Id>,
    },
    /// Unread total for `user_id` changed. Routed to that user's own sessions
    /// so every open tab shows the same badge.
    UnreadCountUpdated { user_id: UserId, unread_count: u64 },
    /// A pending relationship was created.
    FriendRequestReceived {
        /// Complete serialized relationship entity.
        relationship: Value,
        notify_user_ids: Vec<UserId>,
    },
    /// A pending relationship was accepted by its recipient.
    FriendRequestAccepted {
        /// Complete serialized relationship entity.
        relationship: Value,
        notify_user_ids: Vec<UserId>,
    },
    /// `user_id` came online (first live connection) or went offline (last
    /// connection closed and the grace period elapsed).
    PresenceChanged {
        user_id: UserId,
        is_online: bool,
        notify_user_ids: Vec<UserId>,
    },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers are called sequentially and are expected to swallow their own
    /// delivery failures; publishing never fails the caller.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
