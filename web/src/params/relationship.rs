use domain::relationship_status::RelationshipStatus;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct SendRequestParams {
    pub(crate) recipient_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct RespondParams {
    /// `true` accepts the request, `false` rejects it
    pub(crate) accept: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct IndexParams {
    /// Only return relationships in this status
    pub(crate) status: Option<RelationshipStatus>,
}
