//! Attachment uploads.
//!
//! An upload is validated by extension and size, handed to a [`BlobStore`],
//! and turned into the `Attachment` a non-text message carries.

use crate::error::{Error, RejectedKind};
use crate::message_type::MessageType;
use crate::messages::Attachment;
use async_trait::async_trait;
use log::*;
use serde::Serialize;
use service::config::Config;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];
const FILE_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "csv", "doc", "docx", "xls", "xlsx", "zip"];

/// Where a blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub size_bytes: i64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: &[u8], suggested_extension: &str) -> Result<StoredBlob, Error>;
}

/// Writes blobs as files under a directory that is served at `base_url`.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.uploads_dir, config.uploads_base_url.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], suggested_extension: &str) -> Result<StoredBlob, Error> {
        tokio::fs::create_dir_all(&self.root).await?;

        let file_name = format!("{}.{suggested_extension}", uuid::Uuid::new_v4());
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        debug!("Stored {} byte blob as {file_name}", bytes.len());

        Ok(StoredBlob {
            url: format!("{}/{file_name}", self.base_url.trim_end_matches('/')),
            size_bytes: bytes.len() as i64,
        })
    }
}

/// A stored upload, ready to be attached to a message of `message_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UploadedAttachment {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub message_type: MessageType,
}

/// Message type implied by a file name's extension.
pub fn classify(name: &str) -> Result<(String, MessageType), Error> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::rejected(RejectedKind::InvalidRequest, "file name needs an extension"))?;

    let message_type = if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        MessageType::Image
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        MessageType::Video
    } else if FILE_EXTENSIONS.contains(&extension.as_str()) {
        MessageType::File
    } else {
        return Err(Error::rejected(
            RejectedKind::InvalidRequest,
            format!("unsupported attachment type .{extension}"),
        ));
    };

    Ok((extension, message_type))
}

/// Validates and stores an upload.
pub async fn upload(
    store: &dyn BlobStore,
    name: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<UploadedAttachment, Error> {
    let name = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_owned();
    if name.is_empty() {
        return Err(Error::rejected(RejectedKind::InvalidRequest, "file name is required"));
    }
    if bytes.is_empty() {
        return Err(Error::rejected(RejectedKind::InvalidRequest, "file is empty"));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(Error::rejected(
            RejectedKind::InvalidRequest,
            format!("file exceeds the {max_bytes} byte limit"),
        ));
    }

    let (extension, message_type) = classify(&name)?;
    let stored = store.store(bytes, &extension).await?;

    info!("Uploaded {name} ({} bytes) as {message_type}", stored.size_bytes);

    Ok(UploadedAttachment {
        attachment: Attachment {
            url: stored.url,
            name,
            size_bytes: stored.size_bytes,
        },
        message_type,
    })
}
