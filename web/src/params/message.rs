//! Parameters for message endpoints.

use chrono::{DateTime, FixedOffset};
use domain::message::NewMessage;
use domain::message_type::MessageType;
use domain::messages::Attachment;
use domain::UserId;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Body of a send. The sender is always the authenticated caller.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct SendParams {
    pub(crate) receiver_id: UserId,
    #[serde(default)]
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) message_type: MessageType,
    /// Reference returned by `POST /attachments`
    #[serde(default)]
    pub(crate) attachment: Option<Attachment>,
}

impl SendParams {
    pub(crate) fn into_new_message(self, sender_id: UserId) -> NewMessage {
        NewMessage {
            sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            message_type: self.message_type,
            attachment: self.attachment,
        }
    }
}

/// Paging through a conversation, newest first.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct HistoryParams {
    /// Page size, clamped to 1..=100 (default 50)
    pub(crate) limit: Option<u64>,
    /// Only messages created strictly before this instant
    pub(crate) before: Option<DateTime<FixedOffset>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_is_the_default_message_type() {
        let params: SendParams =
            serde_json::from_value(json!({"receiver_id": "bob", "content": "hi"})).unwrap();

        let new_message = params.into_new_message("alice".to_string());
        assert_eq!(new_message.sender_id, "alice");
        assert_eq!(new_message.message_type, MessageType::Text);
        assert!(new_message.attachment.is_none());
    }
}
