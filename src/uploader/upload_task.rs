use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::UploadFailure;
use crate::media::{CancelSignal, MediaId, MediaKind, MediaRecordId, ObjectRef, SourceFile};

use super::backend::MediaBackend;
use super::progress_tracker::TransferProgress;

/// Messages from upload tasks back to the queue that owns the items.
#[derive(Debug)]
pub(crate) enum QueueEvent {
    Progress { id: MediaId, percent: u8 },
    Finished { id: MediaId, outcome: UploadOutcome },
}

#[derive(Debug)]
pub(crate) enum UploadOutcome {
    Uploaded {
        object: ObjectRef,
        record: MediaRecordId,
    },
    Failed(UploadFailure),
    Cancelled,
}

pub(crate) struct UploadJob {
    pub id: MediaId,
    pub file: SourceFile,
    pub kind: MediaKind,
    pub backend: Arc<dyn MediaBackend>,
    pub events: UnboundedSender<QueueEvent>,
    pub session_id: String,
}

/// Runs one upload to completion and reports the outcome to the queue.
pub(crate) async fn run_upload(job: UploadJob, mut cancel: CancelSignal) {
    let outcome = upload(&job, &mut cancel).await;

    match &outcome {
        UploadOutcome::Uploaded { record, .. } => log::info!(
            "Session {}: uploaded {} as media {}",
            job.session_id,
            job.file.name(),
            record
        ),
        UploadOutcome::Failed(failure) => log::warn!(
            "Session {}: upload of {} failed: {}",
            job.session_id,
            job.file.name(),
            failure
        ),
        UploadOutcome::Cancelled => log::info!(
            "Session {}: upload of {} cancelled",
            job.session_id,
            job.file.name()
        ),
    }

    if job
        .events
        .send(QueueEvent::Finished {
            id: job.id,
            outcome,
        })
        .is_err()
    {
        log::debug!("Session {} queue closed before {} finished", job.session_id, job.id);
    }
}

async fn upload(job: &UploadJob, cancel: &mut CancelSignal) -> UploadOutcome {
    let transfer = async {
        let destination = job
            .backend
            .request_upload_destination()
            .await
            .map_err(|e| UploadFailure::DestinationRequestFailed(e.to_string()))?;

        let events = job.events.clone();
        let id = job.id;
        let progress = TransferProgress::new(job.file.size(), move |percent| {
            let _ = events.send(QueueEvent::Progress { id, percent });
        });

        job.backend
            .transfer_bytes(&destination, &job.file, progress)
            .await
            .map_err(|e| UploadFailure::TransferFailed(e.to_string()))
    };

    let object = tokio::select! {
        biased;
        _ = cancel.cancelled() => return UploadOutcome::Cancelled,
        result = transfer => match result {
            Ok(object) => object,
            Err(failure) => return UploadOutcome::Failed(failure),
        },
    };

    // Bytes may have landed, but nothing references them without a record.
    if cancel.is_cancelled() {
        return UploadOutcome::Cancelled;
    }

    let record = match job.backend.register_media(&object, job.kind).await {
        Ok(record) => record,
        Err(e) => {
            log::warn!(
                "Session {}: object {} for {} is left unreferenced",
                job.session_id,
                object,
                job.file.name()
            );
            return UploadOutcome::Failed(UploadFailure::RegistrationFailed(e.to_string()));
        }
    };

    // Cancelled while registering: the record must not outlive the item.
    if cancel.is_cancelled() {
        if let Err(e) = job.backend.delete_media(&record).await {
            log::warn!(
                "Session {}: failed to delete media {} after cancellation: {}",
                job.session_id,
                record,
                e
            );
        }
        return UploadOutcome::Cancelled;
    }

    UploadOutcome::Uploaded { object, record }
}
