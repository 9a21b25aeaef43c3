use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status of the relationship between two identities.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RelationshipStatus {
    /// Requested by `requester_id`, awaiting an answer from `recipient_id`
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// `requester_id` is the blocker
    #[sea_orm(string_value = "blocked")]
    Blocked,
}

impl std::fmt::Display for RelationshipStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipStatus::Pending => write!(fmt, "pending"),
            RelationshipStatus::Accepted => write!(fmt, "accepted"),
            RelationshipStatus::Rejected => write!(fmt, "rejected"),
            RelationshipStatus::Blocked => write!(fmt, "blocked"),
        }
    }
}
