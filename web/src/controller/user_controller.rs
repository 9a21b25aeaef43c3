use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::{AppState, Error};
use domain::error::{Error as DomainError, RejectedKind};
use domain::{presence as PresenceApi, user as UserApi, UserId};
use log::*;
use service::config::ApiVersion;

#[derive(Debug, Serialize, ToSchema)]
pub struct Presence {
    pub user_id: UserId,
    pub is_online: bool,
}

/// GET whether a user currently has a live session
#[utoipa::path(
    get,
    path = "/users/{id}/presence",
    params(
        ApiVersion,
        ("id" = String, Path, description = "User whose presence to read")
    ),
    responses(
        (status = 200, description = "Current presence", body = Presence),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a friend of this user")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn presence(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(viewer_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse, Error> {
    if !PresenceApi::can_view(app_state.db_conn_ref(), &viewer_id, &user_id).await? {
        return Err(DomainError::rejected(
            RejectedKind::Forbidden,
            "presence is only visible to friends",
        )
        .into());
    }

    let is_online = app_state.sse_manager.is_online(&user_id);

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        Presence { user_id, is_online },
    )))
}

/// DELETE the caller's account along with its messages and relationships
#[utoipa::path(
    delete,
    path = "/users/me",
    params(ApiVersion),
    responses(
        (status = 200, description = "Account deleted", body = domain::user::DeletionReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "The assistant cannot be deleted"),
        (status = 500, description = "Deletion stopped part way")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_me(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    warn!("User {user_id} requested account deletion");

    let report = UserApi::delete(app_state.db_conn_ref(), &user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), report)))
}
