use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::media::{MediaKind, MediaRecordId, ObjectRef, PostId, SourceFile};
use crate::recipe::CreatePostRequest;

use super::progress_tracker::TransferProgress;

/// One-time upload target issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDestination {
    pub url: String,
    /// Known up front for some stores; otherwise returned by the transfer.
    pub object_ref: Option<ObjectRef>,
}

impl UploadDestination {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            object_ref: None,
        }
    }
}

/// Everything the upload queue needs from the remote platform.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn request_upload_destination(&self) -> AppResult<UploadDestination>;

    /// Sends the raw bytes, advancing `progress` as they flow.
    async fn transfer_bytes(
        &self,
        destination: &UploadDestination,
        file: &SourceFile,
        progress: TransferProgress,
    ) -> AppResult<ObjectRef>;

    async fn register_media(&self, object: &ObjectRef, kind: MediaKind)
        -> AppResult<MediaRecordId>;

    /// Removes a media record and its backing object.
    async fn delete_media(&self, record: &MediaRecordId) -> AppResult<()>;

    async fn create_post(&self, request: &CreatePostRequest) -> AppResult<PostId>;
}
