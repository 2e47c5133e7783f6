//! Concurrent media upload queue for composing recipe posts.
//!
//! Selected files are validated, staged as [`media::MediaItem`]s and uploaded
//! with bounded concurrency by [`uploader::UploadQueue`]; once every item has
//! settled the uploaded media are attached to a new post.

pub mod cli;
pub mod config;
pub mod errors;
pub mod media;
pub mod notifications;
pub mod preview;
pub mod probe;
pub mod recipe;
pub mod uploader;
pub mod validation;

pub use config::{MetadataProbePolicy, UploaderConfig};
pub use errors::{AppError, AppResult, RejectionReason, SubmitError, UploadFailure};
pub use media::{MediaId, MediaItem, MediaKind, MediaRecordId, ObjectRef, PostId, SourceFile};
pub use recipe::{CreatePostRequest, RecipeForm};
pub use uploader::{MediaBackend, UploadQueue};
