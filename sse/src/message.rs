use serde::Serialize;
use serde_json::Value;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    // Messages
    #[serde(rename = "new_message")]
    NewMessage { message: Value },
    #[serde(rename = "message_sent")]
    MessageSent { message: Value },
    #[serde(rename = "message_read")]
    MessageRead {
        reader_id: String,
        message_ids: Vec<String>,
    },
    #[serde(rename = "unread_count_updated")]
    UnreadCountUpdated { unread_count: u64 },

    // Presence
    #[serde(rename = "presence_updated")]
    PresenceUpdated { user_id: String, is_online: bool },

    // Relationships
    #[serde(rename = "friend_request_received")]
    FriendRequestReceived { relationship: Value },
    #[serde(rename = "friend_request_accepted")]
    FriendRequestAccepted { relationship: Value },
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::NewMessage { .. } => "new_message",
            Event::MessageSent { .. } => "message_sent",
            Event::MessageRead { .. } => "message_read",
            Event::UnreadCountUpdated { .. } => "unread_count_updated",
            Event::PresenceUpdated { .. } => "presence_updated",
            Event::FriendRequestReceived { .. } => "friend_request_received",
            Event::FriendRequestAccepted { .. } => "friend_request_accepted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send to all connections for a specific user
    User { user_id: String },
    /// Send to all connections of each listed user
    Users { user_ids: Vec<String> },
}

/// A serialized event as it travels down a connection's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event_type: &'static str,
    pub data: String,
}

impl From<Frame> for axum::response::sse::Event {
    fn from(frame: Frame) -> Self {
        axum::response::sse::Event::default()
            .event(frame.event_type)
            .data(frame.data)
    }
}
