//! `SeaORM` Entity for the relationships table.
//! At most one row exists per unordered pair of identities, enforced by the
//! unique `pair_key` column.

use crate::relationship_status::RelationshipStatus;
use crate::{Id, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::relationships::Model)]
#[sea_orm(table_name = "relationships")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,
    /// Initiator of the request, or the blocker when `status` is `blocked`
    pub requester_id: UserId,
    pub recipient_id: UserId,
    #[serde(skip)]
    #[sea_orm(unique)]
    pub pair_key: String,
    pub status: RelationshipStatus,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub requested_at: DateTimeWithTimeZone,
    #[serde(skip_deserializing)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub accepted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::RequesterId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Requester,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::RecipientId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Recipient,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The participant that is not `user_id`.
    pub fn counterpart_of(&self, user_id: &str) -> &str {
        if self.requester_id == user_id {
            &self.recipient_id
        } else {
            &self.requester_id
        }
    }

    /// True when `user_id` created this record as a block.
    pub fn is_blocked_by(&self, user_id: &str) -> bool {
        self.status == RelationshipStatus::Blocked && self.requester_id == user_id
    }
}

/// Order-independent key for a pair of identities.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_argument_order() {
        assert_eq!(pair_key("alice", "bob"), pair_key("bob", "alice"));
        assert_eq!(pair_key("alice", "bob"), "alice|bob");
    }

    #[test]
    fn pair_key_does_not_collide_on_shared_prefixes() {
        assert_ne!(pair_key("ab", "c"), pair_key("a", "bc"));
    }
}
