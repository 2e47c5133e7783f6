#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};

use recipe_uploader::uploader::{MediaBackend, TransferProgress, UploadDestination, UploadQueue};
use recipe_uploader::{
    AppError, AppResult, CreatePostRequest, MediaKind, MediaRecordId, ObjectRef, PostId,
    SourceFile,
};

/// In-memory backend whose transfers can be held open per file name.
#[derive(Default)]
pub struct ScriptedBackend {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    registration_gates: Mutex<HashMap<String, Arc<Notify>>>,
    fail_destinations: AtomicUsize,
    fail_transfers: Mutex<HashSet<String>>,
    fail_registrations: Mutex<HashSet<String>>,
    fail_create_post: AtomicBool,
    destination_requests: AtomicUsize,
    transfers_started: Mutex<Vec<String>>,
    registrations_started: Mutex<Vec<String>>,
    registered: Mutex<Vec<MediaRecordId>>,
    deleted: Mutex<Vec<MediaRecordId>>,
    posts: Mutex<Vec<CreatePostRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds the transfer of `name` until `release(name)`.
    pub fn gate(&self, name: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, name: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(name) {
            gate.notify_one();
        }
    }

    /// Holds `register_media` for `name` until `release_registration(name)`.
    pub fn gate_registration(&self, name: &str) {
        self.registration_gates
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Notify::new()));
    }

    pub fn release_registration(&self, name: &str) {
        if let Some(gate) = self.registration_gates.lock().unwrap().get(name) {
            gate.notify_one();
        }
    }

    pub fn fail_next_destinations(&self, count: usize) {
        self.fail_destinations.store(count, Ordering::SeqCst);
    }

    pub fn fail_transfer_of(&self, name: &str) {
        self.fail_transfers.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_registration_of(&self, name: &str) {
        self.fail_registrations
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn fail_create_post(&self, fail: bool) {
        self.fail_create_post.store(fail, Ordering::SeqCst);
    }

    pub fn destination_requests(&self) -> usize {
        self.destination_requests.load(Ordering::SeqCst)
    }

    pub fn transfers_started(&self) -> Vec<String> {
        self.transfers_started.lock().unwrap().clone()
    }

    pub fn registrations_started(&self) -> Vec<String> {
        self.registrations_started.lock().unwrap().clone()
    }

    pub fn registered(&self) -> Vec<MediaRecordId> {
        self.registered.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MediaRecordId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<CreatePostRequest> {
        self.posts.lock().unwrap().clone()
    }

    pub fn record_for(name: &str) -> MediaRecordId {
        MediaRecordId(format!("media-{}", name))
    }
}

#[async_trait]
impl MediaBackend for ScriptedBackend {
    async fn request_upload_destination(&self) -> AppResult<UploadDestination> {
        let n = self.destination_requests.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_destinations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::backend("media:generateUploadUrl", "storage unavailable"));
        }
        Ok(UploadDestination::new(format!("https://storage.test/upload/{}", n)))
    }

    async fn transfer_bytes(
        &self,
        _destination: &UploadDestination,
        file: &SourceFile,
        mut progress: TransferProgress,
    ) -> AppResult<ObjectRef> {
        self.transfers_started
            .lock()
            .unwrap()
            .push(file.name().to_string());

        progress.advance(file.size() / 2);

        let gate = self.gates.lock().unwrap().get(file.name()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_transfers.lock().unwrap().contains(file.name()) {
            return Err(AppError::backend("upload", "HTTP 500: connection reset"));
        }

        progress.finish();
        Ok(ObjectRef(format!("obj-{}", file.name())))
    }

    async fn register_media(
        &self,
        object: &ObjectRef,
        _kind: MediaKind,
    ) -> AppResult<MediaRecordId> {
        let name = object.as_str().trim_start_matches("obj-").to_string();
        self.registrations_started.lock().unwrap().push(name.clone());

        let gate = self.registration_gates.lock().unwrap().get(&name).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_registrations.lock().unwrap().contains(&name) {
            return Err(AppError::backend("media:saveMedia", "returned null"));
        }
        let record = Self::record_for(&name);
        self.registered.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn delete_media(&self, record: &MediaRecordId) -> AppResult<()> {
        self.deleted.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn create_post(&self, request: &CreatePostRequest) -> AppResult<PostId> {
        if self.fail_create_post.load(Ordering::SeqCst) {
            return Err(AppError::backend("recipes:createRecipe", "Server Error"));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(request.clone());
        Ok(PostId(format!("post-{}", posts.len())))
    }
}

pub fn image(name: &str) -> SourceFile {
    SourceFile::new(name, "image/jpeg", vec![0u8; 2048])
}

pub async fn with_timeout<F: Future>(future: F) -> F::Output {
    timeout(Duration::from_secs(5), future)
        .await
        .expect("queue did not reach the expected state in time")
}

/// Applies events until `done` holds, checking the concurrency bound after each one.
pub async fn drive_until(queue: &mut UploadQueue, done: impl Fn(&UploadQueue) -> bool) {
    with_timeout(async {
        while !done(&*queue) {
            queue
                .next_event()
                .await
                .expect("no upload in flight while waiting");
            assert!(queue.uploading_count() <= queue.max_concurrent());
        }
    })
    .await
}

/// Polls `check` until it holds.
pub async fn eventually(check: impl Fn() -> bool) {
    with_timeout(async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}
