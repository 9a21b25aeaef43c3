use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::relationship::{IndexParams, RespondParams, SendRequestParams};
use crate::{AppState, Error};
use domain::relationship_status::RelationshipStatus;
use domain::{relationship as RelationshipApi, Id, UserId};
use log::*;
use service::config::ApiVersion;

/// How the caller stands with one other identity.
#[derive(Debug, Serialize, ToSchema)]
pub struct RelationshipView {
    pub other_id: UserId,
    /// `None` when the pair has no relationship at all
    pub status: Option<RelationshipStatus>,
    pub blocked_by_me: bool,
    pub blocked_by_them: bool,
}

/// POST a friend request to another identity
#[utoipa::path(
    post,
    path = "/relationships",
    params(ApiVersion),
    request_body = SendRequestParams,
    responses(
        (status = 201, description = "Friend request created", body = domain::relationships::Model),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Blocked or not allowed"),
        (status = 404, description = "Recipient not found"),
        (status = 409, description = "A relationship already exists"),
        (status = 429, description = "Too many requests")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<SendRequestParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST friend request {user_id} -> {}", params.recipient_id);

    let relationship = RelationshipApi::send_request(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        &user_id,
        &params.recipient_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), relationship)))
}

/// GET all relationships the caller takes part in
#[utoipa::path(
    get,
    path = "/relationships",
    params(ApiVersion, IndexParams),
    responses(
        (status = 200, description = "Relationships involving the caller", body = [domain::relationships::Model]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET relationships for {user_id} with status {:?}", params.status);

    let relationships =
        RelationshipApi::find_by_participant(app_state.db_conn_ref(), &user_id, params.status)
            .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), relationships)))
}

/// PUT an answer to a pending friend request addressed to the caller
#[utoipa::path(
    put,
    path = "/relationships/{id}/response",
    params(
        ApiVersion,
        ("id" = String, Path, description = "Relationship id")
    ),
    request_body = RespondParams,
    responses(
        (status = 200, description = "Request answered", body = domain::relationships::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the recipient"),
        (status = 404, description = "No pending request with this id")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn respond(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<RespondParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("PUT response {} to relationship {id} by {user_id}", params.accept);

    let relationship = RelationshipApi::respond(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        id,
        &user_id,
        params.accept,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), relationship)))
}

/// GET the caller's standing with another identity
#[utoipa::path(
    get,
    path = "/relationships/with/{other_id}",
    params(
        ApiVersion,
        ("other_id" = String, Path, description = "The other identity")
    ),
    responses(
        (status = 200, description = "Relationship status and block flags", body = RelationshipView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(other_id): Path<UserId>,
) -> Result<impl IntoResponse, Error> {
    let db = app_state.db_conn_ref();

    let view = RelationshipView {
        status: RelationshipApi::query(db, &user_id, &other_id).await?,
        blocked_by_me: RelationshipApi::is_blocked_by(db, &user_id, &other_id).await?,
        blocked_by_them: RelationshipApi::is_blocked_by(db, &other_id, &user_id).await?,
        other_id,
    };

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), view)))
}

/// DELETE the caller's relationship with another identity
#[utoipa::path(
    delete,
    path = "/relationships/with/{other_id}",
    params(
        ApiVersion,
        ("other_id" = String, Path, description = "The other identity")
    ),
    responses(
        (status = 204, description = "Relationship removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "The assistant relationship cannot be removed"),
        (status = 404, description = "No removable relationship")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(other_id): Path<UserId>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE relationship between {user_id} and {other_id}");

    RelationshipApi::remove(app_state.db_conn_ref(), &user_id, &other_id).await?;

    Ok(Json(ApiResponse::<()>::no_content(
        StatusCode::NO_CONTENT.into(),
    )))
}
