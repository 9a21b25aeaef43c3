use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of payload carried by a message. Everything other than `Text`
/// refers to an uploaded attachment.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MessageType {
    #[sea_orm(string_value = "text")]
    #[default]
    Text,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "file")]
    File,
    #[sea_orm(string_value = "video")]
    Video,
}

impl MessageType {
    pub fn requires_attachment(&self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Text => write!(fmt, "text"),
            MessageType::Image => write!(fmt, "image"),
            MessageType::File => write!(fmt, "file"),
            MessageType::Video => write!(fmt, "video"),
        }
    }
}
