use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::block::BlockParams;
use crate::{AppState, Error};
use domain::{relationship as RelationshipApi, UserId};
use log::*;
use service::config::ApiVersion;

/// POST a block against another identity
#[utoipa::path(
    post,
    path = "/blocks",
    params(ApiVersion),
    request_body = BlockParams,
    responses(
        (status = 201, description = "Target blocked", body = domain::relationships::Model),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Already blocked by the target, or target is the assistant"),
        (status = 404, description = "Target not found"),
        (status = 409, description = "Caller already blocks the target")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<BlockParams>,
) -> Result<impl IntoResponse, Error> {
    info!("User {user_id} blocking {}", params.target_id);

    let relationship =
        RelationshipApi::block(app_state.db_conn_ref(), &user_id, &params.target_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), relationship)))
}

/// DELETE a block the caller placed
#[utoipa::path(
    delete,
    path = "/blocks/{target_id}",
    params(
        ApiVersion,
        ("target_id" = String, Path, description = "The blocked identity")
    ),
    responses(
        (status = 204, description = "Block lifted"),
        (status = 400, description = "Relationship is not blocked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the blocker can unblock"),
        (status = 404, description = "No relationship with the target")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(target_id): Path<UserId>,
) -> Result<impl IntoResponse, Error> {
    info!("User {user_id} unblocking {target_id}");

    RelationshipApi::unblock(app_state.db_conn_ref(), &user_id, &target_id).await?;

    Ok(Json(ApiResponse::<()>::no_content(
        StatusCode::NO_CONTENT.into(),
    )))
}
