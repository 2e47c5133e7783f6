use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::{AppError, AppResult, UploadFailure};
use crate::preview::PreviewHandle;
use crate::validation::InputValidator;

/// Client-side identifier of a staged media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(Uuid);

impl MediaId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

remote_id!(
    /// Reference to raw bytes in remote object storage.
    ObjectRef
);
remote_id!(
    /// Durable media record registered for an uploaded object.
    MediaRecordId
);
remote_id!(PostId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let lower = mime_type.to_ascii_lowercase();
        if lower.starts_with("image/") {
            Some(MediaKind::Image)
        } else if lower.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A file picked by the user: name, declared MIME type and contents.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    mime_type: String,
    data: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Loads a file from disk, detecting its MIME type from content or extension.
    pub async fn from_path(file_path: &str) -> AppResult<Self> {
        InputValidator::validate_file_path(file_path)?;

        let data = tokio::fs::read(file_path).await?;
        let raw_name = Path::new(file_path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mime_type = InputValidator::detect_mime_type(file_path, &data);

        log::debug!(
            "Loaded {} ({} bytes, {})",
            file_path,
            data.len(),
            mime_type
        );

        Ok(Self::new(
            InputValidator::sanitize_filename(&raw_name),
            mime_type,
            data,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Owning side of an upload's cancellation channel. Consumed by `cancel`.
#[derive(Debug)]
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    pub fn cancel(self) {
        // The task may already have finished; nothing to signal then.
        let _ = self.tx.send(());
    }
}

/// Task side of the cancellation channel. A dropped handle counts as cancelled.
#[derive(Debug)]
pub struct CancelSignal {
    rx: oneshot::Receiver<()>,
    fired: bool,
}

impl CancelSignal {
    /// Resolves once the handle is used or dropped. Cancel-safe.
    pub async fn cancelled(&mut self) {
        if !self.fired {
            let _ = (&mut self.rx).await;
            self.fired = true;
        }
    }

    pub fn is_cancelled(&mut self) -> bool {
        if self.fired {
            return true;
        }
        match self.rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => false,
            _ => {
                self.fired = true;
                true
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = oneshot::channel();
    (CancelHandle { tx }, CancelSignal { rx, fired: false })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Queued,
    Uploading,
    Uploaded,
    Failed,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Queued => "queued",
            StatusKind::Uploading => "uploading",
            StatusKind::Uploaded => "uploaded",
            StatusKind::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: StatusKind) -> bool {
        matches!(
            (self, next),
            (StatusKind::Queued, StatusKind::Uploading)
                | (StatusKind::Uploading, StatusKind::Uploaded)
                | (StatusKind::Uploading, StatusKind::Failed)
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, StatusKind::Uploaded | StatusKind::Failed)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum MediaStatus {
    Queued,
    Uploading {
        progress: u8,
        cancel: CancelHandle,
    },
    Uploaded {
        remote_object_id: ObjectRef,
        remote_media_record_id: MediaRecordId,
    },
    Failed {
        reason: UploadFailure,
    },
}

impl MediaStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            MediaStatus::Queued => StatusKind::Queued,
            MediaStatus::Uploading { .. } => StatusKind::Uploading,
            MediaStatus::Uploaded { .. } => StatusKind::Uploaded,
            MediaStatus::Failed { .. } => StatusKind::Failed,
        }
    }
}

/// One file staged for upload as part of a recipe post.
#[derive(Debug)]
pub struct MediaItem {
    id: MediaId,
    source: SourceFile,
    preview: PreviewHandle,
    kind: MediaKind,
    status: MediaStatus,
}

impl MediaItem {
    pub fn new(source: SourceFile, kind: MediaKind, preview: PreviewHandle) -> Self {
        Self {
            id: MediaId::new(),
            source,
            preview,
            kind,
            status: MediaStatus::Queued,
        }
    }

    pub fn id(&self) -> MediaId {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn file_name(&self) -> &str {
        self.source.name()
    }

    pub fn preview_url(&self) -> String {
        self.preview.url()
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn status(&self) -> &MediaStatus {
        &self.status
    }

    pub fn status_kind(&self) -> StatusKind {
        self.status.kind()
    }

    /// Upload progress in percent; `None` unless uploading or uploaded.
    pub fn progress(&self) -> Option<u8> {
        match &self.status {
            MediaStatus::Uploading { progress, .. } => Some(*progress),
            MediaStatus::Uploaded { .. } => Some(100),
            _ => None,
        }
    }

    pub fn remote_object_id(&self) -> Option<&ObjectRef> {
        match &self.status {
            MediaStatus::Uploaded {
                remote_object_id, ..
            } => Some(remote_object_id),
            _ => None,
        }
    }

    pub fn remote_media_record_id(&self) -> Option<&MediaRecordId> {
        match &self.status {
            MediaStatus::Uploaded {
                remote_media_record_id,
                ..
            } => Some(remote_media_record_id),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&UploadFailure> {
        match &self.status {
            MediaStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Moves the item to `next`, refusing anything outside the lifecycle graph.
    pub fn transition(&mut self, next: MediaStatus) -> AppResult<()> {
        let from = self.status.kind();
        let to = next.kind();
        if !from.can_transition_to(to) {
            return Err(AppError::IllegalTransition {
                id: self.id.to_string(),
                from: from.as_str(),
                to: to.as_str(),
            });
        }

        log::debug!("Media {} ({}): {} -> {}", self.id, self.file_name(), from, to);
        self.status = next;
        Ok(())
    }

    /// Raises the progress of an uploading item. Never moves backwards.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        match &mut self.status {
            MediaStatus::Uploading { progress, .. } => {
                let clamped = percent.min(100);
                if clamped > *progress {
                    *progress = clamped;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Consumes the item, aborting its transfer if one is in flight.
    /// The preview is released when the item is dropped here.
    pub fn discard(self) -> bool {
        match self.status {
            MediaStatus::Uploading { cancel, .. } => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }
}
