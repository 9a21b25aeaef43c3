use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::message::{HistoryParams, SendParams};
use crate::{AppState, Error};
use domain::{message as MessageApi, Id, UserId};
use log::*;
use service::config::ApiVersion;

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCounts {
    /// Sender id to number of unread messages from that sender
    pub by_sender: BTreeMap<UserId, u64>,
    pub total: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResult {
    /// The caller's remaining unread count across all conversations
    pub unread_count: u64,
}

/// POST a message from the caller to another identity
#[utoipa::path(
    post,
    path = "/messages",
    params(ApiVersion),
    request_body = SendParams,
    responses(
        (status = 201, description = "Message stored and delivered to live sessions", body = domain::messages::Model),
        (status = 400, description = "Empty, oversized or malformed message"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not friends, or a block is in place"),
        (status = 404, description = "Receiver not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<SendParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST message {user_id} -> {}", params.receiver_id);

    let message = MessageApi::send(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        params.into_new_message(user_id),
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), message)))
}

/// GET the caller's unread counts grouped by sender
#[utoipa::path(
    get,
    path = "/messages/unread",
    params(ApiVersion),
    responses(
        (status = 200, description = "Unread counts", body = UnreadCounts),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unread(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let by_sender = MessageApi::unread_counts(app_state.db_conn_ref(), &user_id).await?;
    let total = by_sender.values().sum();

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        UnreadCounts { by_sender, total },
    )))
}

/// GET a single message the caller sent or received
#[utoipa::path(
    get,
    path = "/messages/{id}",
    params(
        ApiVersion,
        ("id" = String, Path, description = "Message id")
    ),
    responses(
        (status = 200, description = "The message", body = domain::messages::Model),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such message, or the caller is not a party to it")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET message {id} for {user_id}");

    let message = MessageApi::find_by_id(app_state.db_conn_ref(), &user_id, id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), message)))
}

/// GET a page of the conversation between the caller and a counterpart
#[utoipa::path(
    get,
    path = "/messages/with/{counterpart_id}",
    params(
        ApiVersion,
        ("counterpart_id" = String, Path, description = "The other party"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "Messages, newest first", body = [domain::messages::Model]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn history(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(counterpart_id): Path<UserId>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET history between {user_id} and {counterpart_id}: {params:?}");

    let messages = MessageApi::history(
        app_state.db_conn_ref(),
        &user_id,
        &counterpart_id,
        params.before,
        params.limit,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}

/// PUT every unread message from a counterpart to the caller as read
#[utoipa::path(
    put,
    path = "/messages/with/{counterpart_id}/read",
    params(
        ApiVersion,
        ("counterpart_id" = String, Path, description = "Sender whose messages were read")
    ),
    responses(
        (status = 200, description = "Messages marked read", body = MarkReadResult),
        (status = 400, description = "Invalid counterpart"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_read(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(counterpart_id): Path<UserId>,
) -> Result<impl IntoResponse, Error> {
    let unread_count = MessageApi::mark_read(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        &user_id,
        &counterpart_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        MarkReadResult { unread_count },
    )))
}
