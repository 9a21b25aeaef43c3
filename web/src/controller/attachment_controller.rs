use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::attachment::UploadParams;
use crate::{AppState, Error};
use domain::attachment as AttachmentApi;
use log::*;
use service::config::ApiVersion;

/// POST raw file bytes; the response is the reference to put on a message.
#[utoipa::path(
    post,
    path = "/attachments",
    params(ApiVersion, UploadParams),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Attachment stored", body = domain::attachment::UploadedAttachment),
        (status = 400, description = "Empty, oversized or unsupported file"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<impl IntoResponse, Error> {
    info!(
        "User {user_id} uploading {} ({} bytes)",
        params.name,
        body.len()
    );

    let uploaded = AttachmentApi::upload(
        app_state.blob_store.as_ref(),
        &params.name,
        &body,
        app_state.config().max_attachment_bytes,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), uploaded)))
}
