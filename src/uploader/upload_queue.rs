use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult, NotReadyReason, RejectionReason, SubmitError};
use crate::media::{
    cancel_pair, MediaId, MediaItem, MediaRecordId, MediaStatus, PostId, SourceFile, StatusKind,
};
use crate::notifications::{LogNotifier, Muted, Notification, Notifier};
use crate::preview::PreviewStore;
use crate::probe::{MediaProbe, Mp4Probe};
use crate::recipe::RecipeForm;
use crate::validation::MediaValidator;

use super::backend::MediaBackend;
use super::progress_tracker::QueueSummary;
use super::upload_task::{run_upload, QueueEvent, UploadJob, UploadOutcome};

/// Result of one file-selection action.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SelectionReport {
    pub accepted: Vec<MediaId>,
    pub rejected: Vec<(String, RejectionReason)>,
}

/// What a processed event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueUpdate {
    Progress { id: MediaId, percent: u8 },
    Uploaded { id: MediaId },
    Failed { id: MediaId },
    Removed { id: MediaId },
    /// The event belonged to an item that is no longer queued.
    Stale,
}

/// Owns the staged media of one compose session and drives their uploads,
/// keeping at most `max_concurrent` transfers in flight.
///
/// Upload tasks never touch the items; they post `QueueEvent`s that are applied
/// one at a time by `next_event`.
pub struct UploadQueue {
    session_id: String,
    items: Vec<MediaItem>,
    max_concurrent: usize,
    peak_uploading: usize,
    validator: MediaValidator,
    backend: Arc<dyn MediaBackend>,
    notifier: Arc<dyn Notifier>,
    previews: PreviewStore,
    events_tx: UnboundedSender<QueueEvent>,
    events_rx: UnboundedReceiver<QueueEvent>,
    /// How long `reset` waits for aborted tasks to report back.
    settle_timeout: Duration,
}

impl UploadQueue {
    pub fn new(config: &UploaderConfig, backend: Arc<dyn MediaBackend>) -> Self {
        let notifier: Arc<dyn Notifier> = if config.show_upload_notifications {
            Arc::new(LogNotifier)
        } else {
            Arc::new(Muted)
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4().to_string();

        log::info!(
            "Session {} opened (max {} concurrent uploads)",
            session_id,
            config.max_concurrent_uploads
        );

        Self {
            session_id,
            items: Vec::new(),
            max_concurrent: config.max_concurrent_uploads.max(1),
            peak_uploading: 0,
            validator: MediaValidator::new(config, Arc::new(Mp4Probe)),
            backend,
            notifier,
            previews: PreviewStore::new(),
            events_tx,
            events_rx,
            settle_timeout: config.request_timeout(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_validator(mut self, validator: MediaValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_probe(self, config: &UploaderConfig, probe: Arc<dyn MediaProbe>) -> Self {
        self.with_validator(MediaValidator::new(config, probe))
    }

    pub fn with_preview_store(mut self, previews: PreviewStore) -> Self {
        self.previews = previews;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, id: MediaId) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Highest number of simultaneous uploads seen in this session.
    pub fn peak_uploading(&self) -> usize {
        self.peak_uploading
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn count(&self, status: StatusKind) -> usize {
        self.items
            .iter()
            .filter(|item| item.status_kind() == status)
            .count()
    }

    pub fn uploading_count(&self) -> usize {
        self.count(StatusKind::Uploading)
    }

    pub fn has_pending(&self) -> bool {
        self.items
            .iter()
            .any(|item| !item.status_kind().is_settled())
    }

    pub fn summary(&self) -> QueueSummary {
        QueueSummary::from_items(&self.items)
    }

    /// Record ids of uploaded items, in selection order.
    pub fn media_record_ids(&self) -> Vec<MediaRecordId> {
        self.items
            .iter()
            .filter_map(|item| item.remote_media_record_id().cloned())
            .collect()
    }

    fn position(&self, id: MediaId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Validates a batch of selected files and enqueues the ones that pass.
    /// Each file is judged on its own; rejections only produce notifications.
    pub async fn select_files(&mut self, files: Vec<SourceFile>) -> SelectionReport {
        let validator = &self.validator;
        let verdicts = join_all(files.iter().map(|file| validator.validate(file))).await;

        let mut report = SelectionReport::default();
        for (file, verdict) in files.into_iter().zip(verdicts) {
            match verdict {
                Ok(admission) => {
                    if let Some(warning) = admission.warning {
                        self.notifier
                            .notify(Notification::admitted_with_warning(file.name(), warning));
                    }
                    let preview = self.previews.allocate(file.name());
                    let item = MediaItem::new(file, admission.kind, preview);
                    log::info!(
                        "Session {}: queued {} ({}, {} bytes) as {}",
                        self.session_id,
                        item.file_name(),
                        item.kind().as_str(),
                        item.source().size(),
                        item.id()
                    );
                    report.accepted.push(item.id());
                    self.items.push(item);
                }
                Err(reason) => {
                    log::warn!(
                        "Session {}: rejected {}: {}",
                        self.session_id,
                        file.name(),
                        reason
                    );
                    self.notifier
                        .notify(Notification::rejected(file.name(), reason.clone()));
                    report.rejected.push((file.name().to_string(), reason));
                }
            }
        }

        if !report.accepted.is_empty() {
            self.notifier
                .notify(Notification::files_queued(report.accepted.len()));
        }

        self.pump();
        report
    }

    /// Admission control: promote the oldest queued items while there is room.
    fn pump(&mut self) {
        while self.uploading_count() < self.max_concurrent {
            let Some(index) = self
                .items
                .iter()
                .position(|item| item.status_kind() == StatusKind::Queued)
            else {
                break;
            };

            if let Err(e) = self.start_upload(index) {
                log::error!("Session {}: could not start upload: {}", self.session_id, e);
                break;
            }
        }

        self.peak_uploading = self.peak_uploading.max(self.uploading_count());
    }

    fn start_upload(&mut self, index: usize) -> AppResult<()> {
        let (cancel, signal) = cancel_pair();
        let item = &mut self.items[index];
        item.transition(MediaStatus::Uploading {
            progress: 0,
            cancel,
        })?;

        let job = UploadJob {
            id: item.id(),
            file: item.source().clone(),
            kind: item.kind(),
            backend: Arc::clone(&self.backend),
            events: self.events_tx.clone(),
            session_id: self.session_id.clone(),
        };

        log::info!(
            "Session {}: uploading {} ({}/{} slots)",
            self.session_id,
            job.file.name(),
            self.uploading_count(),
            self.max_concurrent
        );

        tokio::spawn(run_upload(job, signal));
        Ok(())
    }

    /// Waits for the next task event and applies it. Returns `None` when no
    /// upload is in flight and no event is waiting.
    pub async fn next_event(&mut self) -> Option<QueueUpdate> {
        let event = match self.events_rx.try_recv() {
            Ok(event) => event,
            Err(_) if self.uploading_count() == 0 => return None,
            Err(_) => self.events_rx.recv().await?,
        };

        let update = self.apply(event);
        self.pump();
        Some(update)
    }

    /// Processes events until every item is uploaded or failed.
    pub async fn run_until_settled(&mut self) -> QueueSummary {
        while self.has_pending() {
            if self.next_event().await.is_none() {
                break;
            }
        }
        self.summary()
    }

    fn apply(&mut self, event: QueueEvent) -> QueueUpdate {
        match event {
            QueueEvent::Progress { id, percent } => match self.position(id) {
                Some(index) => {
                    let item = &mut self.items[index];
                    item.record_progress(percent);
                    QueueUpdate::Progress {
                        id,
                        percent: item.progress().unwrap_or(0),
                    }
                }
                None => QueueUpdate::Stale,
            },
            QueueEvent::Finished { id, outcome } => {
                let Some(index) = self.position(id) else {
                    if let UploadOutcome::Uploaded { record, .. } = outcome {
                        self.discard_orphan(record);
                    }
                    return QueueUpdate::Stale;
                };

                match outcome {
                    UploadOutcome::Uploaded { object, record } => {
                        let transition = self.items[index].transition(MediaStatus::Uploaded {
                            remote_object_id: object,
                            remote_media_record_id: record,
                        });
                        match transition {
                            Ok(()) => QueueUpdate::Uploaded { id },
                            Err(e) => {
                                log::error!("Session {}: {}", self.session_id, e);
                                QueueUpdate::Stale
                            }
                        }
                    }
                    UploadOutcome::Failed(failure) => {
                        let item = &mut self.items[index];
                        let file_name = item.file_name().to_string();
                        if let Err(e) = item.transition(MediaStatus::Failed {
                            reason: failure.clone(),
                        }) {
                            log::error!("Session {}: {}", self.session_id, e);
                            return QueueUpdate::Stale;
                        }
                        self.notifier
                            .notify(Notification::upload_failed(&file_name, failure));
                        QueueUpdate::Failed { id }
                    }
                    UploadOutcome::Cancelled => {
                        self.items.remove(index).discard();
                        QueueUpdate::Removed { id }
                    }
                }
            }
        }
    }

    /// A record registered for an item that was removed in the meantime.
    fn discard_orphan(&self, record: MediaRecordId) {
        log::info!(
            "Session {}: deleting media {} registered after its item was removed",
            self.session_id,
            record
        );
        let backend = Arc::clone(&self.backend);
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.delete_media(&record).await {
                log::warn!(
                    "Session {}: failed to delete orphaned media {}: {}",
                    session_id,
                    record,
                    e
                );
            }
        });
    }

    /// Drops a queued, uploading or failed item. An in-flight transfer is
    /// aborted and the item disappears without a failure or notification.
    pub fn cancel(&mut self, id: MediaId) -> AppResult<()> {
        let index = self.position(id).ok_or_else(|| AppError::item_not_found(id))?;
        if self.items[index].status_kind() == StatusKind::Uploaded {
            return Err(AppError::validation(
                "id",
                "Media is already uploaded; remove it instead",
            ));
        }

        let item = self.items.remove(index);
        let file_name = item.file_name().to_string();
        let aborted = item.discard();
        log::info!(
            "Session {}: removed {}{}",
            self.session_id,
            file_name,
            if aborted { " (upload aborted)" } else { "" }
        );

        self.pump();
        Ok(())
    }

    /// Removes any item; an uploaded one also has its remote record deleted.
    pub async fn remove(&mut self, id: MediaId) -> AppResult<()> {
        let index = self.position(id).ok_or_else(|| AppError::item_not_found(id))?;
        if self.items[index].status_kind() != StatusKind::Uploaded {
            return self.cancel(id);
        }

        let item = self.items.remove(index);
        if let Some(record) = item.remote_media_record_id() {
            if let Err(e) = self.backend.delete_media(record).await {
                log::warn!(
                    "Session {}: failed to delete media {} for {}: {}",
                    self.session_id,
                    record,
                    item.file_name(),
                    e
                );
            }
        }
        item.discard();

        self.pump();
        Ok(())
    }

    /// Aborts every upload, releases every preview and deletes uploaded
    /// records, leaving the queue empty. Cleanup failures are only logged.
    ///
    /// Reports already sent by tasks are applied first, and aborted tasks are
    /// awaited, so a record registered just before the reset is still deleted.
    pub async fn reset(&mut self) {
        let mut unused_records = Vec::new();

        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                QueueEvent::Finished {
                    id,
                    outcome: UploadOutcome::Uploaded { record, .. },
                } if self.position(id).is_none() => unused_records.push(record),
                event => {
                    self.apply(event);
                }
            }
        }

        let items = std::mem::take(&mut self.items);
        if items.is_empty() && unused_records.is_empty() {
            log::debug!("Session {}: reset on empty queue", self.session_id);
            return;
        }

        let mut in_flight = HashSet::new();
        for item in items {
            if let Some(record) = item.remote_media_record_id() {
                unused_records.push(record.clone());
            }
            let id = item.id();
            if item.discard() {
                in_flight.insert(id);
            }
        }

        log::info!(
            "Session {}: reset ({} uploads aborted, {} uploaded media to delete)",
            self.session_id,
            in_flight.len(),
            unused_records.len()
        );

        if !in_flight.is_empty() {
            let settled = timeout(
                self.settle_timeout,
                self.await_aborted(&mut in_flight, &mut unused_records),
            )
            .await;
            if settled.is_err() {
                log::warn!(
                    "Session {}: {} aborted upload(s) did not report back within {:?}",
                    self.session_id,
                    in_flight.len(),
                    self.settle_timeout
                );
            }
        }

        let backend = &self.backend;
        let results = join_all(
            unused_records
                .iter()
                .map(|record| async move { (record, backend.delete_media(record).await) }),
        )
        .await;

        for (record, result) in results {
            if let Err(e) = result {
                log::warn!(
                    "Session {}: failed to delete media {} during reset: {}",
                    self.session_id,
                    record,
                    e
                );
            }
        }
    }

    /// Receives until every aborted task has finished. Any of them that
    /// registered a record before seeing the abort hands it over for deletion.
    async fn await_aborted(
        &mut self,
        in_flight: &mut HashSet<MediaId>,
        unused_records: &mut Vec<MediaRecordId>,
    ) {
        while !in_flight.is_empty() {
            match self.events_rx.recv().await {
                Some(QueueEvent::Finished { id, outcome }) => {
                    in_flight.remove(&id);
                    if let UploadOutcome::Uploaded { record, .. } = outcome {
                        unused_records.push(record);
                    }
                }
                Some(QueueEvent::Progress { .. }) => {}
                None => break,
            }
        }
    }

    /// Tears the session down without submitting.
    pub async fn close(mut self) {
        self.reset().await;
        log::info!("Session {} closed", self.session_id);
    }

    /// Creates the recipe post from the uploaded media, in selection order.
    ///
    /// Nothing is sent unless every item has settled and at least one uploaded.
    /// On failure the queue is left untouched so the user can retry.
    pub async fn submit(&mut self, form: RecipeForm) -> Result<PostId, SubmitError> {
        if self.items.is_empty() {
            return Err(SubmitError::NotReady(NotReadyReason::NoMedia));
        }

        let pending = self.summary().pending();
        if pending > 0 {
            return Err(SubmitError::NotReady(NotReadyReason::UploadsPending {
                pending,
            }));
        }

        let media_ids = self.media_record_ids();
        if media_ids.is_empty() {
            return Err(SubmitError::NoValidMedia);
        }

        form.validate()?;
        let request = form.into_request(media_ids);

        let post_id = match self.backend.create_post(&request).await {
            Ok(post_id) => post_id,
            Err(e) => {
                log::error!("Session {}: create post failed: {}", self.session_id, e);
                return Err(SubmitError::CreatePostFailed(e.to_string()));
            }
        };

        log::info!(
            "Session {}: created post {} with {} media",
            self.session_id,
            post_id,
            request.media_ids.len()
        );
        self.notifier
            .notify(Notification::post_created(post_id.as_str()));

        // Every uploaded record now belongs to the post; nothing to delete.
        for item in std::mem::take(&mut self.items) {
            item.discard();
        }

        Ok(post_id)
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        let unused = self.media_record_ids();
        if !unused.is_empty() {
            log::warn!(
                "Session {} dropped with {} uploaded media still attached; call reset() to delete them",
                self.session_id,
                unused.len()
            );
        }
    }
}
