use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub(crate) struct UploadParams {
    /// Original file name; its extension decides the message type
    pub(crate) name: String,
}
