//! `SeaORM` Entity for the users table.
//! Only the identity record itself lives here; profiles and credentials are
//! owned by the identity provider.

use crate::UserId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reserved identity of the non-human assistant participant. It can never be
/// blocked, unblocked or have its relationships removed.
pub const ASSISTANT_ID: &str = "parley-assistant";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::users::Model)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: UserId,
    pub display_name: String,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn is_assistant(user_id: &str) -> bool {
    user_id == ASSISTANT_ID
}
