//! `SeaORM` Entity for the messages table.

use crate::message_type::MessageType;
use crate::{Id, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::messages::Model)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub sent_at: DateTimeWithTimeZone,
    /// Flips false -> true once, when the receiver has seen the message
    pub is_read: bool,
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_size_bytes: Option<i64>,
}

/// Stored blob referenced by a non-text message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub size_bytes: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SenderId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Sender,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ReceiverId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Receiver,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn attachment(&self) -> Option<Attachment> {
        match (
            &self.attachment_url,
            &self.attachment_name,
            self.attachment_size_bytes,
        ) {
            (Some(url), Some(name), Some(size_bytes)) => Some(Attachment {
                url: url.clone(),
                name: name.clone(),
                size_bytes,
            }),
            _ => None,
        }
    }
}
