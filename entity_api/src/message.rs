use super::error::Error;
use chrono::Utc;
use entity::message_type::MessageType;
use entity::messages::{ActiveModel, Attachment, Column, Entity, Model};
use entity::{Id, UserId};
use log::*;
use sea_orm::{
    entity::prelude::*, sea_query::Expr, Condition, ConnectionTrait, PaginatorTrait, QueryOrder,
    QuerySelect, Set,
};
use std::collections::BTreeMap;

/// Fields supplied by the sender; id, timestamp and read flag are assigned here.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub attachment: Option<Attachment>,
}

pub async fn create(db: &impl ConnectionTrait, new_message: NewMessage) -> Result<Model, Error> {
    debug!(
        "New Message {} -> {} ({}) to be inserted",
        new_message.sender_id, new_message.receiver_id, new_message.message_type
    );

    let (attachment_url, attachment_name, attachment_size_bytes) = match new_message.attachment {
        Some(attachment) => (
            Some(attachment.url),
            Some(attachment.name),
            Some(attachment.size_bytes),
        ),
        None => (None, None, None),
    };

    let message_active_model = ActiveModel {
        id: Set(Id::new_v4()),
        sender_id: Set(new_message.sender_id),
        receiver_id: Set(new_message.receiver_id),
        content: Set(new_message.content),
        sent_at: Set(Utc::now().into()),
        is_read: Set(false),
        message_type: Set(new_message.message_type),
        attachment_url: Set(attachment_url),
        attachment_name: Set(attachment_name),
        attachment_size_bytes: Set(attachment_size_bytes),
    };

    Ok(message_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Messages exchanged between `a` and `b` in either direction, newest first.
/// Participant ids are matched exactly.
pub async fn find_conversation(
    db: &impl ConnectionTrait,
    a: &str,
    b: &str,
    before: Option<DateTimeWithTimeZone>,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find().filter(conversation_condition(a, b));

    if let Some(before) = before {
        query = query.filter(Column::SentAt.lt(before));
    }

    Ok(query
        .order_by_desc(Column::SentAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Ids of messages sent by `sender_id` to `reader_id` that are still unread.
pub async fn find_unread_ids(
    db: &impl ConnectionTrait,
    reader_id: &str,
    sender_id: &str,
) -> Result<Vec<Id>, Error> {
    Ok(Entity::find()
        .select_only()
        .column(Column::Id)
        .filter(Column::ReceiverId.eq(reader_id))
        .filter(Column::SenderId.eq(sender_id))
        .filter(Column::IsRead.eq(false))
        .order_by_asc(Column::SentAt)
        .into_tuple::<Id>()
        .all(db)
        .await?)
}

/// Flips `is_read` on the given messages. Already read rows are left untouched
/// so the flag only ever moves from false to true.
pub async fn mark_read(db: &impl ConnectionTrait, ids: &[Id]) -> Result<u64, Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = Entity::update_many()
        .col_expr(Column::IsRead, Expr::value(true))
        .filter(Column::Id.is_in(ids.iter().copied()))
        .filter(Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Total unread messages addressed to `reader_id`.
pub async fn count_unread(db: &impl ConnectionTrait, reader_id: &str) -> Result<u64, Error> {
    Ok(Entity::find()
        .filter(Column::ReceiverId.eq(reader_id))
        .filter(Column::IsRead.eq(false))
        .count(db)
        .await?)
}

/// Unread messages addressed to `reader_id`, grouped by sender.
pub async fn unread_counts_by_sender(
    db: &impl ConnectionTrait,
    reader_id: &str,
) -> Result<BTreeMap<UserId, u64>, Error> {
    let senders: Vec<UserId> = Entity::find()
        .select_only()
        .column(Column::SenderId)
        .filter(Column::ReceiverId.eq(reader_id))
        .filter(Column::IsRead.eq(false))
        .into_tuple()
        .all(db)
        .await?;

    let mut counts = BTreeMap::new();
    for sender in senders {
        *counts.entry(sender).or_insert(0) += 1;
    }

    Ok(counts)
}

/// Removes every message `user_id` sent or received, returning how many rows went away.
pub async fn delete_by_participant(db: &impl ConnectionTrait, user_id: &str) -> Result<u64, Error> {
    let result = Entity::delete_many()
        .filter(
            Condition::any()
                .add(Column::SenderId.eq(user_id))
                .add(Column::ReceiverId.eq(user_id)),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

fn conversation_condition(a: &str, b: &str) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(Column::SenderId.eq(a))
                .add(Column::ReceiverId.eq(b)),
        )
        .add(
            Condition::all()
                .add(Column::SenderId.eq(b))
                .add(Column::ReceiverId.eq(a)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup;
    use crate::user;

    async fn setup_with_users() -> sea_orm::DatabaseConnection {
        let db = setup().await;
        for id in ["alice", "bob", "carol", "al"] {
            user::create(&db, id, id).await.unwrap();
        }
        db
    }

    fn text(sender: &str, receiver: &str, content: &str) -> NewMessage {
        NewMessage {
            sender_id: sender.to_owned(),
            receiver_id: receiver.to_owned(),
            content: content.to_owned(),
            message_type: MessageType::Text,
            attachment: None,
        }
    }

    #[tokio::test]
    async fn create_persists_an_unread_message() -> Result<(), Error> {
        let db = setup_with_users().await;

        let message = create(&db, text("alice", "bob", "hi")).await?;
        let stored = find_by_id(&db, message.id).await?;

        assert!(!stored.is_read);
        assert_eq!(stored.content, "hi");
        assert_eq!(stored.attachment(), None);

        Ok(())
    }

    #[tokio::test]
    async fn create_keeps_the_attachment_triple() -> Result<(), Error> {
        let db = setup_with_users().await;

        let attachment = Attachment {
            url: "/uploads/cat.png".to_owned(),
            name: "cat.png".to_owned(),
            size_bytes: 2048,
        };
        let message = create(
            &db,
            NewMessage {
                message_type: MessageType::Image,
                attachment: Some(attachment.clone()),
                ..text("alice", "bob", "")
            },
        )
        .await?;

        assert_eq!(message.attachment(), Some(attachment));

        Ok(())
    }

    #[tokio::test]
    async fn find_conversation_uses_exact_participant_ids() -> Result<(), Error> {
        let db = setup_with_users().await;

        create(&db, text("alice", "bob", "one")).await?;
        create(&db, text("bob", "alice", "two")).await?;
        create(&db, text("al", "bob", "not part of it")).await?;
        create(&db, text("alice", "carol", "also not")).await?;

        let conversation = find_conversation(&db, "alice", "bob", None, 50).await?;

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].content, "two");
        assert_eq!(conversation[1].content, "one");

        Ok(())
    }

    #[tokio::test]
    async fn find_conversation_pages_with_before_and_limit() -> Result<(), Error> {
        let db = setup_with_users().await;

        for n in 0..5 {
            create(&db, text("alice", "bob", &format!("m{n}"))).await?;
        }

        let newest = find_conversation(&db, "alice", "bob", None, 2).await?;
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].content, "m4");

        let older =
            find_conversation(&db, "alice", "bob", Some(newest[1].sent_at), 10).await?;
        assert_eq!(older.len(), 3);
        assert_eq!(older[0].content, "m2");

        Ok(())
    }

    #[tokio::test]
    async fn mark_read_only_flips_unread_messages() -> Result<(), Error> {
        let db = setup_with_users().await;

        create(&db, text("alice", "bob", "one")).await?;
        create(&db, text("alice", "bob", "two")).await?;
        create(&db, text("carol", "bob", "three")).await?;

        let ids = find_unread_ids(&db, "bob", "alice").await?;
        assert_eq!(ids.len(), 2);

        assert_eq!(mark_read(&db, &ids).await?, 2);
        assert_eq!(mark_read(&db, &ids).await?, 0);
        assert_eq!(count_unread(&db, "bob").await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn unread_counts_by_sender_groups_per_sender() -> Result<(), Error> {
        let db = setup_with_users().await;

        create(&db, text("alice", "bob", "one")).await?;
        create(&db, text("alice", "bob", "two")).await?;
        create(&db, text("carol", "bob", "three")).await?;
        create(&db, text("bob", "alice", "not for bob")).await?;

        let counts = unread_counts_by_sender(&db, "bob").await?;

        assert_eq!(counts.get("alice"), Some(&2));
        assert_eq!(counts.get("carol"), Some(&1));
        assert_eq!(counts.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn delete_by_participant_removes_sent_and_received() -> Result<(), Error> {
        let db = setup_with_users().await;

        create(&db, text("alice", "bob", "one")).await?;
        create(&db, text("bob", "alice", "two")).await?;
        create(&db, text("bob", "carol", "three")).await?;

        assert_eq!(delete_by_participant(&db, "alice").await?, 2);
        assert_eq!(count_unread(&db, "carol").await?, 1);

        Ok(())
    }
}
