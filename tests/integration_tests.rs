mod common;

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use common::{with_timeout, ScriptedBackend};
use recipe_uploader::notifications::RecordingNotifier;
use recipe_uploader::validation::InputValidator;
use recipe_uploader::{
    AppError, MediaKind, RecipeForm, SourceFile, UploadQueue, UploaderConfig,
};

/// Integration tests for the recipe media uploader
/// These tests load real files from disk and push them through the queue

struct TempMedia {
    path: PathBuf,
}

impl TempMedia {
    fn create(name: &str, data: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!("{}_{}", std::process::id(), name));
        let mut file = File::create(&path).expect("Failed to create test file");
        file.write_all(data).expect("Failed to write test file");
        Self { path }
    }

    fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[tokio::test]
async fn test_full_recipe_workflow_from_disk() {
    let photo = TempMedia::create("integration_dough.png", &create_minimal_png());
    let clip = TempMedia::create("integration_bake.mp4", &create_mp4(1000, 4_000));

    let photo_file = SourceFile::from_path(&photo.path_str()).await.unwrap();
    let clip_file = SourceFile::from_path(&clip.path_str()).await.unwrap();

    assert_eq!(photo_file.mime_type(), "image/png");
    assert_eq!(clip_file.mime_type(), "video/mp4");
    assert!(photo_file.name().ends_with("integration_dough.png"));

    let backend = ScriptedBackend::new();
    let recorder = RecordingNotifier::new();
    let mut queue = UploadQueue::new(&UploaderConfig::default(), backend.clone())
        .with_notifier(Arc::new(recorder.clone()));

    let report = queue.select_files(vec![photo_file, clip_file]).await;
    assert_eq!(report.accepted.len(), 2);
    assert_eq!(queue.items()[0].kind(), MediaKind::Image);
    assert_eq!(queue.items()[1].kind(), MediaKind::Video);

    let summary = with_timeout(queue.run_until_settled()).await;
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.overall_progress, 100.0);

    let form = RecipeForm {
        title: "Rosemary focaccia".to_string(),
        caption: Some("Crispy edges".to_string()),
        ingredients: vec!["500g flour".to_string(), "400ml water".to_string()],
        steps: vec!["Mix".to_string(), "Proof".to_string(), "Bake".to_string()],
        tags: vec!["bread".to_string()],
    };
    queue.submit(form).await.unwrap();

    let posts = backend.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].media_ids.len(), 2);
    assert_eq!(posts[0].tags, Some(vec!["bread".to_string()]));
    assert_eq!(recorder.codes(), vec!["files_queued", "post_created"]);
}

#[tokio::test]
async fn test_long_video_from_disk_is_rejected() {
    let clip = TempMedia::create("integration_long.mp4", &create_mp4(600, 600 * 25));
    let clip_file = SourceFile::from_path(&clip.path_str()).await.unwrap();

    let backend = ScriptedBackend::new();
    let recorder = RecordingNotifier::new();
    let mut queue = UploadQueue::new(&UploaderConfig::default(), backend.clone())
        .with_notifier(Arc::new(recorder.clone()));

    let report = queue.select_files(vec![clip_file]).await;

    assert!(report.accepted.is_empty());
    assert_eq!(recorder.codes(), vec!["too_long"]);
    assert_eq!(backend.destination_requests(), 0);
}

#[tokio::test]
async fn test_mime_detection_prefers_content_over_extension() {
    // PNG bytes behind a misleading extension
    let disguised = TempMedia::create("integration_disguised.mp4", &create_minimal_png());
    let file = SourceFile::from_path(&disguised.path_str()).await.unwrap();
    assert_eq!(file.mime_type(), "image/png");

    let unknown = TempMedia::create("integration_notes.txt", b"two cups of flour");
    let file = SourceFile::from_path(&unknown.path_str()).await.unwrap();
    assert_eq!(file.mime_type(), "application/octet-stream");
}

#[tokio::test]
async fn test_missing_file_is_reported() {
    let path = std::env::temp_dir().join("integration_does_not_exist.png");
    let result = SourceFile::from_path(&path.to_string_lossy()).await;

    assert!(matches!(result, Err(AppError::FileNotFound { .. })));
}

#[test]
fn test_security_validation_integration() {
    assert!(InputValidator::validate_file_path("").is_err());
    assert!(InputValidator::validate_file_path("../../../etc/passwd").is_err());
    assert!(InputValidator::validate_file_path("~/secret.png").is_err());

    assert_eq!(
        InputValidator::sanitize_filename("pan<cakes>.jpg"),
        "pan_cakes_.jpg"
    );
}

fn create_minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, // IHDR chunk length
        0x49, 0x48, 0x44, 0x52, // IHDR
        0x00, 0x00, 0x00, 0x01, // width = 1
        0x00, 0x00, 0x00, 0x01, // height = 1
        0x08, 0x02, 0x00, 0x00, 0x00, // bit depth = 8, color type = 2 (RGB)
        0x90, 0x77, 0x53, 0xDE, // IHDR CRC
        0x00, 0x00, 0x00, 0x00, // IEND chunk length
        0x49, 0x45, 0x4E, 0x44, // IEND
        0xAE, 0x42, 0x60, 0x82, // IEND CRC
    ]
}

fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn create_mp4(timescale: u32, duration: u32) -> Vec<u8> {
    let mut mvhd = vec![0u8; 12]; // version 0, flags, creation, modification
    mvhd.extend_from_slice(&timescale.to_be_bytes());
    mvhd.extend_from_slice(&duration.to_be_bytes());
    mvhd.extend_from_slice(&[0u8; 80]);

    let mut data = mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2mp41");
    data.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd)));
    data.extend(mp4_box(b"mdat", &[0u8; 64]));
    data
}
