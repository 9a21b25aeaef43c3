//! Message authorization and delivery.
//!
//! A message is only persisted between two identities whose relationship is
//! `Accepted` and where neither has blocked the other. Realtime delivery
//! happens after the insert commits and never fails the send.

use crate::error::{Error, RejectedKind};
use crate::events::{DomainEvent, EventPublisher};
use crate::message_type::MessageType;
use crate::messages::Model;
use crate::relationship_status::RelationshipStatus;
use crate::{event_payload, Id, UserId};
use entity_api::{message, relationship};
use log::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::collections::BTreeMap;

pub use entity_api::message::NewMessage;

/// Longest accepted text body, in characters.
pub const MAX_CONTENT_CHARS: usize = 4000;
pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Authorizes, persists and delivers a message.
///
/// Once the row is stored the call succeeds, whether or not either party has
/// a live connection. Repeating a send stores a second message.
pub async fn send(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    new_message: NewMessage,
) -> Result<Model, Error> {
    if new_message.receiver_id.is_empty() {
        return Err(Error::rejected(RejectedKind::InvalidRequest, "receiver id is required"));
    }
    if new_message.receiver_id == new_message.sender_id {
        return Err(Error::rejected(
            RejectedKind::InvalidRequest,
            "cannot send a message to yourself",
        ));
    }
    validate_content(&new_message)?;

    let sender_id = new_message.sender_id.clone();
    let receiver_id = new_message.receiver_id.clone();

    // The pair row stays locked until the message is stored so a concurrent
    // block cannot slip in between the check and the insert
    let txn = db.begin().await?;

    let existing = relationship::find_between_for_update(&txn, &sender_id, &receiver_id).await?;

    if let Some(existing) = &existing {
        if existing.is_blocked_by(&receiver_id) {
            return Err(Error::rejected(RejectedKind::Forbidden, "you have been blocked by this user"));
        }
        if existing.is_blocked_by(&sender_id) {
            return Err(Error::rejected(
                RejectedKind::Forbidden,
                "unblock this user before sending messages",
            ));
        }
    }

    if !existing.is_some_and(|r| r.status == RelationshipStatus::Accepted) {
        debug!("Message from {sender_id} to {receiver_id} refused: not friends");
        return Err(Error::rejected(
            RejectedKind::Forbidden,
            "you can only message accepted friends",
        ));
    }

    let created = message::create(&txn, new_message).await?;
    txn.commit().await?;

    info!("Message {} stored from {sender_id} to {receiver_id}", created.id);

    if let Some(payload) = event_payload(&created) {
        event_publisher
            .publish(DomainEvent::MessageCreated {
                message: payload,
                sender_id: sender_id.clone(),
                receiver_id: receiver_id.clone(),
            })
            .await;
    }

    match message::count_unread(db, &receiver_id).await {
        Ok(unread_count) => {
            event_publisher
                .publish(DomainEvent::UnreadCountUpdated {
                    user_id: receiver_id,
                    unread_count,
                })
                .await
        }
        Err(e) => warn!("Could not refresh unread count for {receiver_id}: {e}"),
    }

    Ok(created)
}

/// Marks every unread message from `counterpart_id` to `reader_id` as read and
/// returns how many unread messages the reader has left overall.
///
/// The counterpart is told which of its messages were read, and the reader's
/// other sessions receive the new unread count.
pub async fn mark_read(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    reader_id: &str,
    counterpart_id: &str,
) -> Result<u64, Error> {
    if counterpart_id.is_empty() {
        return Err(Error::rejected(RejectedKind::InvalidRequest, "counterpart id is required"));
    }

    let unread_ids = message::find_unread_ids(db, reader_id, counterpart_id).await?;
    let flipped = message::mark_read(db, &unread_ids).await?;
    let remaining = message::count_unread(db, reader_id).await?;

    debug!("{reader_id} read {flipped} message(s) from {counterpart_id}, {remaining} unread left");

    if !unread_ids.is_empty() {
        event_publisher
            .publish(DomainEvent::MessagesRead {
                reader_id: reader_id.to_owned(),
                counterpart_id: counterpart_id.to_owned(),
                message_ids: unread_ids,
            })
            .await;
    }

    event_publisher
        .publish(DomainEvent::UnreadCountUpdated {
            user_id: reader_id.to_owned(),
            unread_count: remaining,
        })
        .await;

    Ok(remaining)
}

/// A page of the conversation between `viewer_id` and `counterpart_id`,
/// newest first. `before` continues from an earlier page.
pub async fn history(
    db: &DatabaseConnection,
    viewer_id: &str,
    counterpart_id: &str,
    before: Option<DateTimeWithTimeZone>,
    limit: Option<u64>,
) -> Result<Vec<Model>, Error> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    Ok(message::find_conversation(db, viewer_id, counterpart_id, before, limit).await?)
}

pub async fn unread_counts(db: &DatabaseConnection, reader_id: &str) -> Result<BTreeMap<UserId, u64>, Error> {
    Ok(message::unread_counts_by_sender(db, reader_id).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, viewer_id: &str, id: Id) -> Result<Model, Error> {
    let found = message::find_by_id(db, id).await?;
    if found.sender_id != viewer_id && found.receiver_id != viewer_id {
        return Err(Error::rejected(RejectedKind::NotFound, "message not found"));
    }
    Ok(found)
}

fn validate_content(new_message: &NewMessage) -> Result<(), Error> {
    if new_message.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(Error::rejected(
            RejectedKind::InvalidRequest,
            format!("message content is limited to {MAX_CONTENT_CHARS} characters"),
        ));
    }

    match (&new_message.message_type, &new_message.attachment) {
        (MessageType::Text, Some(_)) => Err(Error::rejected(
            RejectedKind::InvalidRequest,
            "text messages cannot carry an attachment",
        )),
        (MessageType::Text, None) if new_message.content.trim().is_empty() => Err(
            Error::rejected(RejectedKind::InvalidRequest, "message content is required"),
        ),
        (kind, None) if kind.requires_attachment() => Err(Error::rejected(
            RejectedKind::InvalidRequest,
            format!("{kind} messages need an attachment"),
        )),
        (_, Some(attachment)) if attachment.url.is_empty() || attachment.size_bytes < 0 => Err(
            Error::rejected(RejectedKind::InvalidRequest, "attachment is malformed"),
        ),
        _ => Ok(()),
    }
}
