use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Backend rejected {operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("Backend rate limit exceeded during {operation}")]
    RateLimit { operation: String },

    #[error("Illegal status transition for media item {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Media item not found: {id}")]
    ItemNotFound { id: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::FileNotFound {
            path: path.to_string(),
        }
    }

    pub fn backend(operation: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn item_not_found(id: impl ToString) -> Self {
        Self::ItemNotFound { id: id.to_string() }
    }
}

/// Why a selected file was not admitted to the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Unsupported file type: {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Video too long: {duration_ms}ms (max {max_ms}ms)")]
    TooLong { duration_ms: u64, max_ms: u64 },

    #[error("Could not read media metadata: {detail}")]
    MetadataUnreadable { detail: String },
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::UnsupportedType { .. } => "unsupported_type",
            RejectionReason::TooLarge { .. } => "too_large",
            RejectionReason::TooLong { .. } => "too_long",
            RejectionReason::MetadataUnreadable { .. } => "metadata_unreadable",
        }
    }
}

/// Why an admitted item ended up `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum UploadFailure {
    #[error("Could not obtain an upload destination: {0}")]
    DestinationRequestFailed(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Could not register uploaded media: {0}")]
    RegistrationFailed(String),
}

impl UploadFailure {
    pub fn code(&self) -> &'static str {
        match self {
            UploadFailure::DestinationRequestFailed(_) => "destination_request_failed",
            UploadFailure::TransferFailed(_) => "transfer_failed",
            UploadFailure::RegistrationFailed(_) => "registration_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyReason {
    NoMedia,
    UploadsPending { pending: usize },
}

/// Errors returned to the compose form by `UploadQueue::submit`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("{}", not_ready_message(.0))]
    NotReady(NotReadyReason),

    #[error("No valid media to submit")]
    NoValidMedia,

    #[error("Invalid recipe: {field} - {message}")]
    InvalidForm { field: String, message: String },

    #[error("Failed to create recipe: {0}")]
    CreatePostFailed(String),
}

fn not_ready_message(reason: &NotReadyReason) -> String {
    match reason {
        NotReadyReason::NoMedia => "Add at least one image or video".to_string(),
        NotReadyReason::UploadsPending { pending } => format!(
            "Wait for {} upload(s) to finish or remove pending files",
            pending
        ),
    }
}

impl SubmitError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::NotReady(_) => "not_ready",
            SubmitError::NoValidMedia => "no_valid_media",
            SubmitError::InvalidForm { .. } => "invalid_form",
            SubmitError::CreatePostFailed(_) => "create_post_failed",
        }
    }
}

impl From<AppError> for SubmitError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation { field, message } => SubmitError::InvalidForm { field, message },
            other => SubmitError::CreatePostFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        let reason = RejectionReason::TooLarge { size: 11, max: 10 };
        assert_eq!(reason.code(), "too_large");
        assert_eq!(
            UploadFailure::TransferFailed("reset".into()).code(),
            "transfer_failed"
        );
        assert_eq!(SubmitError::NoValidMedia.code(), "no_valid_media");
    }

    #[test]
    fn test_validation_error_becomes_invalid_form() {
        let err: SubmitError = AppError::validation("title", "Title is required").into();
        assert_eq!(
            err,
            SubmitError::InvalidForm {
                field: "title".into(),
                message: "Title is required".into()
            }
        );
    }

    #[test]
    fn test_not_ready_messages() {
        let pending = SubmitError::NotReady(NotReadyReason::UploadsPending { pending: 2 });
        assert!(pending.to_string().contains("2 upload(s)"));
        let empty = SubmitError::NotReady(NotReadyReason::NoMedia);
        assert_eq!(empty.to_string(), "Add at least one image or video");
    }
}
