use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::{MetadataProbePolicy, UploaderConfig};
use crate::errors::{AppError, AppResult, RejectionReason};
use crate::media::{MediaKind, SourceFile};
use crate::probe::MediaProbe;

pub struct InputValidator;

impl InputValidator {
    pub fn validate_file_path(path: &str) -> AppResult<()> {
        if path.trim().is_empty() {
            return Err(AppError::validation("file_path", "File path cannot be empty"));
        }

        // Check for path traversal attempts
        if path.contains("..") || path.contains('~') {
            return Err(AppError::validation("file_path", "Invalid file path detected"));
        }

        let path_obj = Path::new(path);
        if !path_obj.exists() {
            return Err(AppError::file_not_found(path));
        }

        if !path_obj.is_file() {
            return Err(AppError::validation("file_path", "Path is not a file"));
        }

        Ok(())
    }

    pub fn sanitize_filename(filename: &str) -> String {
        static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
        let unsafe_chars = UNSAFE_CHARS
            .get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static pattern"));
        let sanitized = unsafe_chars.replace_all(filename.trim(), "_");

        // Limit length
        if sanitized.len() > 255 {
            let mut cut = 252;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &sanitized[..cut])
        } else {
            sanitized.to_string()
        }
    }

    /// Sniffs the MIME type from file content, falling back to the extension.
    pub fn detect_mime_type(file_path: &str, data: &[u8]) -> String {
        if let Ok(format) = image::guess_format(data) {
            return format.to_mime_type().to_string();
        }

        if data.len() >= 12 && &data[4..8] == b"ftyp" {
            return if &data[8..12] == b"qt  " {
                "video/quicktime".to_string()
            } else {
                "video/mp4".to_string()
            };
        }

        if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return "video/webm".to_string();
        }

        let extension = Path::new(file_path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        match extension.as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("mp4") | Some("m4v") => "video/mp4",
            Some("mov") => "video/quicktime",
            Some("webm") => "video/webm",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

/// Outcome of admitting a file to the upload queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub kind: MediaKind,
    /// Set when the file was admitted despite a non-fatal problem.
    pub warning: Option<RejectionReason>,
}

/// Admission checks for selected files: allow-listed type, size, video duration.
#[derive(Clone)]
pub struct MediaValidator {
    accepted_mime_types: Vec<String>,
    max_file_size: u64,
    max_video_duration: Option<Duration>,
    probe_policy: MetadataProbePolicy,
    probe: Arc<dyn MediaProbe>,
}

impl MediaValidator {
    pub fn new(config: &UploaderConfig, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            accepted_mime_types: config.accepted_mime_types.clone(),
            max_file_size: config.max_file_size_bytes,
            max_video_duration: config.max_video_duration(),
            probe_policy: config.metadata_probe_policy,
            probe,
        }
    }

    fn accepts(&self, mime_type: &str) -> bool {
        self.accepted_mime_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(mime_type))
    }

    pub async fn validate(&self, file: &SourceFile) -> Result<Admission, RejectionReason> {
        let kind = match MediaKind::from_mime(file.mime_type()) {
            Some(kind) if self.accepts(file.mime_type()) => kind,
            _ => {
                return Err(RejectionReason::UnsupportedType {
                    mime_type: file.mime_type().to_string(),
                })
            }
        };

        if file.size() > self.max_file_size {
            return Err(RejectionReason::TooLarge {
                size: file.size(),
                max: self.max_file_size,
            });
        }

        let max_duration = match (kind, self.max_video_duration) {
            (MediaKind::Video, Some(max)) => max,
            _ => return Ok(Admission { kind, warning: None }),
        };

        match self.probe.video_duration(file).await {
            Ok(duration) if duration > max_duration => Err(RejectionReason::TooLong {
                duration_ms: duration.as_millis() as u64,
                max_ms: max_duration.as_millis() as u64,
            }),
            Ok(_) => Ok(Admission { kind, warning: None }),
            Err(e) => {
                let reason = RejectionReason::MetadataUnreadable {
                    detail: e.to_string(),
                };
                match self.probe_policy {
                    MetadataProbePolicy::Reject => Err(reason),
                    MetadataProbePolicy::Warn => {
                        log::warn!(
                            "Admitting {} without a duration check: {}",
                            file.name(),
                            e
                        );
                        Ok(Admission {
                            kind,
                            warning: Some(reason),
                        })
                    }
                }
            }
        }
    }
}
