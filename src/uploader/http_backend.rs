use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::min;
use tokio::time::{sleep, Duration};

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::media::{MediaKind, MediaRecordId, ObjectRef, PostId, SourceFile};
use crate::recipe::CreatePostRequest;

use super::backend::{MediaBackend, UploadDestination};
use super::progress_tracker::TransferProgress;

const GENERATE_UPLOAD_URL: &str = "media:generateUploadUrl";
const SAVE_MEDIA: &str = "media:saveMedia";
const DELETE_MEDIA: &str = "media:deleteMedia";
const CREATE_RECIPE: &str = "recipes:createRecipe";

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay.as_millis() as f64
            * self.exponential_base.powi(attempt as i32 - 1);

        let delay = Duration::from_millis(delay_ms as u64);
        min(delay, self.max_delay)
    }
}

/// Response wrapper used by the backend's function endpoints.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum MutationEnvelope {
    Success {
        #[serde(default)]
        value: Value,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredObject {
    storage_id: String,
}

fn parse_envelope<T: DeserializeOwned>(path: &str, body: &str) -> AppResult<T> {
    match serde_json::from_str::<MutationEnvelope>(body)? {
        MutationEnvelope::Success { value } => Ok(serde_json::from_value(value)?),
        MutationEnvelope::Error { error_message } => Err(AppError::backend(path, error_message)),
    }
}

/// `None` means the backend refused without an error, e.g. no signed-in user.
fn require<T>(path: &str, value: Option<T>) -> AppResult<T> {
    value.ok_or_else(|| AppError::backend(path, "returned null (not authenticated?)"))
}

fn excerpt(body: &str) -> String {
    body.chars().take(300).collect()
}

/// Mutations that can run twice without creating a second record.
fn is_idempotent(path: &str) -> bool {
    matches!(path, GENERATE_UPLOAD_URL | DELETE_MEDIA)
}

/// A 429 was never processed; a 5xx may have committed before failing.
fn should_retry(path: &str, status_code: u16) -> bool {
    match status_code {
        429 => true,
        500 | 502 | 503 | 504 => is_idempotent(path),
        _ => false,
    }
}

/// Media backend reached over HTTP function calls plus raw object uploads.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    retry_config: RetryConfig,
    chunk_size: usize,
}

impl HttpBackend {
    pub fn new(config: &UploaderConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            retry_config: RetryConfig {
                max_retries: config.max_retry_attempts,
                ..RetryConfig::default()
            },
            chunk_size: config.transfer_chunk_size.max(1),
        })
    }

    fn mutation_url(&self) -> String {
        format!("{}/api/mutation", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn mutation<T: DeserializeOwned>(&self, path: &str, args: Value) -> AppResult<T> {
        let payload = json!({ "path": path, "args": args, "format": "json" });
        let mut attempt = 0;

        loop {
            let response = self
                .authorized(self.client.post(self.mutation_url()))
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if status.is_success() {
                log::debug!("Mutation {} succeeded", path);
                return parse_envelope(path, &body);
            }

            attempt += 1;
            if should_retry(path, status.as_u16()) && attempt <= self.retry_config.max_retries {
                let delay = self.retry_config.backoff_delay(attempt);
                log::warn!(
                    "Mutation {} attempt {} failed with {}, retrying in {:?}",
                    path,
                    attempt,
                    status,
                    delay
                );
                sleep(delay).await;
                continue;
            }

            if status.as_u16() == 429 {
                return Err(AppError::RateLimit {
                    operation: path.to_string(),
                });
            }

            // Function errors come back as JSON even on 4xx
            if let Ok(MutationEnvelope::Error { error_message }) =
                serde_json::from_str::<MutationEnvelope>(&body)
            {
                return Err(AppError::backend(path, error_message));
            }

            return Err(AppError::backend(
                path,
                format!("HTTP {}: {}", status, excerpt(&body)),
            ));
        }
    }
}

#[async_trait]
impl MediaBackend for HttpBackend {
    async fn request_upload_destination(&self) -> AppResult<UploadDestination> {
        let url: String = self.mutation(GENERATE_UPLOAD_URL, json!({})).await?;
        Ok(UploadDestination::new(url))
    }

    async fn transfer_bytes(
        &self,
        destination: &UploadDestination,
        file: &SourceFile,
        mut progress: TransferProgress,
    ) -> AppResult<ObjectRef> {
        let chunks: Vec<Vec<u8>> = file
            .bytes()
            .chunks(self.chunk_size)
            .map(<[u8]>::to_vec)
            .collect();

        // Progress advances as the client pulls each chunk off the stream.
        let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
            progress.advance(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        }));

        log::debug!(
            "Uploading {} ({} bytes) in {}-byte chunks",
            file.name(),
            file.size(),
            self.chunk_size
        );

        let response = self
            .client
            .post(&destination.url)
            .header(CONTENT_TYPE, file.mime_type())
            .header(CONTENT_LENGTH, file.size())
            .body(Body::wrap_stream(stream))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::backend(
                "upload",
                format!("HTTP {}: {}", status, excerpt(&body)),
            ));
        }

        if let Some(object_ref) = &destination.object_ref {
            return Ok(object_ref.clone());
        }

        let stored: StoredObject = serde_json::from_str(&body)?;
        Ok(ObjectRef(stored.storage_id))
    }

    async fn register_media(
        &self,
        object: &ObjectRef,
        kind: MediaKind,
    ) -> AppResult<MediaRecordId> {
        let id: Option<String> = self
            .mutation(
                SAVE_MEDIA,
                json!({ "storageId": object.as_str(), "type": kind.as_str() }),
            )
            .await?;
        require(SAVE_MEDIA, id).map(MediaRecordId)
    }

    async fn delete_media(&self, record: &MediaRecordId) -> AppResult<()> {
        let _: Value = self
            .mutation(DELETE_MEDIA, json!({ "mediaId": record.as_str() }))
            .await?;
        Ok(())
    }

    async fn create_post(&self, request: &CreatePostRequest) -> AppResult<PostId> {
        let id: Option<String> = self
            .mutation(CREATE_RECIPE, serde_json::to_value(request)?)
            .await?;
        require(CREATE_RECIPE, id).map(PostId)
    }
}
