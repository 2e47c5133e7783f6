// Uploader module - drives staged media from selection to post creation
//
// Tasks report back over a channel; only `UploadQueue` mutates item state.

pub mod backend;
pub mod http_backend;
pub mod progress_tracker;
mod upload_task;
pub mod upload_queue;

pub use backend::{MediaBackend, UploadDestination};
pub use http_backend::HttpBackend;
pub use progress_tracker::{QueueSummary, TransferProgress};
pub use upload_queue::{QueueUpdate, SelectionReport, UploadQueue};
