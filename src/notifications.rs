//! User-facing toasts raised by the upload queue.
//!
//! Wording is for humans; `Notification::code` is the stable part.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::errors::{RejectionReason, UploadFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    FilesQueued { count: usize },
    Rejected { reason: RejectionReason },
    AdmittedWithWarning { reason: RejectionReason },
    UploadFailed { failure: UploadFailure },
    PostCreated { post_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub file_name: Option<String>,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn files_queued(count: usize) -> Self {
        Self::build(
            NotificationLevel::Info,
            None,
            format!("{} file(s) added to upload queue", count),
            NotificationKind::FilesQueued { count },
        )
    }

    pub fn rejected(file_name: &str, reason: RejectionReason) -> Self {
        Self::build(
            NotificationLevel::Error,
            Some(file_name),
            format!("{} was not added: {}", file_name, reason),
            NotificationKind::Rejected { reason },
        )
    }

    pub fn admitted_with_warning(file_name: &str, reason: RejectionReason) -> Self {
        Self::build(
            NotificationLevel::Warning,
            Some(file_name),
            format!("{} was added, but {}", file_name, reason),
            NotificationKind::AdmittedWithWarning { reason },
        )
    }

    pub fn upload_failed(file_name: &str, failure: UploadFailure) -> Self {
        Self::build(
            NotificationLevel::Error,
            Some(file_name),
            format!("Upload failed for {}: {}", file_name, failure),
            NotificationKind::UploadFailed { failure },
        )
    }

    pub fn post_created(post_id: &str) -> Self {
        Self::build(
            NotificationLevel::Success,
            None,
            "Recipe posted!".to_string(),
            NotificationKind::PostCreated {
                post_id: post_id.to_string(),
            },
        )
    }

    fn build(
        level: NotificationLevel,
        file_name: Option<&str>,
        message: String,
        kind: NotificationKind,
    ) -> Self {
        Self {
            level,
            file_name: file_name.map(str::to_string),
            kind,
            message,
            created_at: Utc::now(),
        }
    }

    /// Reason code for rejections and failures, event name otherwise.
    pub fn code(&self) -> &'static str {
        match &self.kind {
            NotificationKind::FilesQueued { .. } => "files_queued",
            NotificationKind::Rejected { reason } => reason.code(),
            NotificationKind::AdmittedWithWarning { reason } => reason.code(),
            NotificationKind::UploadFailed { failure } => failure.code(),
            NotificationKind::PostCreated { .. } => "post_created",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => log::error!("{}", notification.message),
            NotificationLevel::Warning => log::warn!("{}", notification.message),
            NotificationLevel::Info | NotificationLevel::Success => {
                log::info!("{}", notification.message)
            }
        }
    }
}

/// Keeps every notification so a UI (or a test) can read them back.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.all().iter().map(Notification::code).collect()
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .map(|mut seen| std::mem::take(&mut *seen))
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(notification),
            Err(e) => log::warn!("Failed to record notification (non-critical): {}", e),
        }
    }
}

/// Drops notifications when toasts are switched off in the config.
pub struct Muted;

impl Notifier for Muted {
    fn notify(&self, notification: Notification) {
        log::debug!("Notification suppressed: {}", notification.message);
    }
}
