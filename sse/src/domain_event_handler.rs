use crate::message::{Event as SseEvent, Message as SseMessage, MessageScope};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to SSE messages and routing them
/// to the affected users' live connections.
///
/// The domain layer decides who is notified; this handler only routes.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }

    fn send_to_user(&self, sse_event: SseEvent, user_id: &str) {
        self.sse_manager.send_message(SseMessage {
            event: sse_event,
            scope: MessageScope::User {
                user_id: user_id.to_string(),
            },
        });
    }

    fn send_to_users(&self, sse_event: SseEvent, user_ids: &[events::UserId]) {
        if user_ids.is_empty() {
            return;
        }

        self.sse_manager.send_message(SseMessage {
            event: sse_event,
            scope: MessageScope::Users {
                user_ids: user_ids.to_vec(),
            },
        });

        debug!("Sent SSE event to {} user(s): {:?}", user_ids.len(), user_ids);
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::MessageCreated {
                message,
                sender_id,
                receiver_id,
            } => {
                debug!("Handling MessageCreated from {sender_id} to {receiver_id}");

                self.send_to_user(
                    SseEvent::NewMessage {
                        message: message.clone(),
                    },
                    receiver_id,
                );
                self.send_to_user(
                    SseEvent::MessageSent {
                        message: message.clone(),
                    },
                    sender_id,
                );
            }

            DomainEvent::MessagesRead {
                reader_id,
                counterpart_id,
                message_ids,
            } => {
                debug!(
                    "Handling MessagesRead: {reader_id} read {} message(s) from {counterpart_id}",
                    message_ids.len()
                );

                self.send_to_user(
                    SseEvent::MessageRead {
                        reader_id: reader_id.clone(),
                        message_ids: message_ids.iter().map(|id| id.to_string()).collect(),
                    },
                    counterpart_id,
                );
            }

            DomainEvent::UnreadCountUpdated {
                user_id,
                unread_count,
            } => {
                self.send_to_user(
                    SseEvent::UnreadCountUpdated {
                        unread_count: *unread_count,
                    },
                    user_id,
                );
            }

            DomainEvent::FriendRequestReceived {
                relationship,
                notify_user_ids,
            } => {
                self.send_to_users(
                    SseEvent::FriendRequestReceived {
                        relationship: relationship.clone(),
                    },
                    notify_user_ids,
                );
            }

            DomainEvent::FriendRequestAccepted {
                relationship,
                notify_user_ids,
            } => {
                self.send_to_users(
                    SseEvent::FriendRequestAccepted {
                        relationship: relationship.clone(),
                    },
                    notify_user_ids,
                );
            }

            DomainEvent::PresenceChanged {
                user_id,
                is_online,
                notify_user_ids,
            } => {
                debug!("Handling PresenceChanged for {user_id}: online={is_online}");

                self.send_to_users(
                    SseEvent::PresenceUpdated {
                        user_id: user_id.clone(),
                        is_online: *is_online,
                    },
                    notify_user_ids,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use crate::message::Frame;

    fn connect(manager: &Manager, user_id: &str) -> UnboundedReceiver<Frame> {
        let (tx, rx) = unbounded_channel();
        manager.register_connection(user_id.to_string(), tx);
        rx
    }

    #[tokio::test]
    async fn message_created_notifies_receiver_and_sender() {
        let manager = Arc::new(Manager::new());
        let mut alice = connect(&manager, "alice");
        let mut bob = connect(&manager, "bob");
        let handler = SseDomainEventHandler::new(manager.clone());

        handler
            .handle(&DomainEvent::MessageCreated {
                message: json!({"content": "hi"}),
                sender_id: "alice".to_string(),
                receiver_id: "bob".to_string(),
            })
            .await;

        assert_eq!(bob.try_recv().unwrap().event_type, "new_message");
        assert_eq!(alice.try_recv().unwrap().event_type, "message_sent");
    }

    #[tokio::test]
    async fn messages_read_notifies_counterpart_only() {
        let manager = Arc::new(Manager::new());
        let mut alice = connect(&manager, "alice");
        let mut bob = connect(&manager, "bob");
        let handler = SseDomainEventHandler::new(manager.clone());

        handler
            .handle(&DomainEvent::MessagesRead {
                reader_id: "bob".to_string(),
                counterpart_id: "alice".to_string(),
                message_ids: vec![events::Id::new_v4()],
            })
            .await;

        let frame = alice.try_recv().unwrap();
        assert_eq!(frame.event_type, "message_read");
        assert!(frame.data.contains("\"reader_id\":\"bob\""));
        assert!(bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn presence_changed_goes_to_notify_list() {
        let manager = Arc::new(Manager::new());
        let mut alice = connect(&manager, "alice");
        let mut carol = connect(&manager, "carol");
        let handler = SseDomainEventHandler::new(manager.clone());

        handler
            .handle(&DomainEvent::PresenceChanged {
                user_id: "bob".to_string(),
                is_online: false,
                notify_user_ids: vec!["alice".to_string()],
            })
            .await;

        let frame = alice.try_recv().unwrap();
        assert_eq!(frame.event_type, "presence_updated");
        assert!(frame.data.contains("\"is_online\":false"));
        assert!(carol.try_recv().is_err());
    }

    #[tokio::test]
    async fn unread_count_updated_goes_to_user() {
        let manager = Arc::new(Manager::new());
        let mut bob = connect(&manager, "bob");
        let handler = SseDomainEventHandler::new(manager.clone());

        handler
            .handle(&DomainEvent::UnreadCountUpdated {
                user_id: "bob".to_string(),
                unread_count: 4,
            })
            .await;

        let frame = bob.try_recv().unwrap();
        assert_eq!(frame.event_type, "unread_count_updated");
        assert!(frame.data.contains("\"unread_count\":4"));
    }
}
