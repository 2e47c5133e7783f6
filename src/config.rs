use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// What to do with a video whose duration cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataProbePolicy {
    /// Refuse the file with `MetadataUnreadable`.
    Reject,
    /// Admit the file and surface a warning.
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    pub backend_url: String,
    pub auth_token: Option<String>,
    pub max_concurrent_uploads: usize,
    pub max_file_size_bytes: u64,
    pub accepted_mime_types: Vec<String>,
    pub max_video_duration_secs: Option<u64>,
    pub metadata_probe_policy: MetadataProbePolicy,
    pub request_timeout_secs: u64,
    pub max_retry_attempts: u32,
    pub transfer_chunk_size: usize,
    pub show_upload_notifications: bool,
    pub log_level: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:3210".to_string(),
            auth_token: None,
            max_concurrent_uploads: 3,
            max_file_size_bytes: 10 * 1024 * 1024, // 10MB
            accepted_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "video/mp4".to_string(),
            ],
            max_video_duration_secs: Some(10),
            metadata_probe_policy: MetadataProbePolicy::Reject,
            request_timeout_secs: 120,
            max_retry_attempts: 3,
            transfer_chunk_size: 64 * 1024,
            show_upload_notifications: true,
            log_level: "info".to_string(),
        }
    }
}

impl UploaderConfig {
    pub fn max_video_duration(&self) -> Option<Duration> {
        self.max_video_duration_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured log level; unknown names fall back to `info`.
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join("Recipe Uploader");

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<UploaderConfig> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        load_config_from(&config_path)
    } else {
        let default_config = UploaderConfig::default();
        save_config_to(&default_config, &config_path)?;
        Ok(default_config)
    }
}

/// Reads a config file, falling back to defaults when it cannot be parsed.
pub fn load_config_from(path: &Path) -> AppResult<UploaderConfig> {
    let config_str = fs::read_to_string(path)?;
    let config: UploaderConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        log::warn!(
            "Failed to parse config file {}: {}. Using defaults.",
            path.display(),
            e
        );
        UploaderConfig::default()
    });

    validate_config(&config)?;
    Ok(config)
}

pub fn save_config(config: &UploaderConfig) -> AppResult<()> {
    validate_config(config)?;
    save_config_to(config, &get_config_path()?)
}

fn save_config_to(config: &UploaderConfig, config_path: &Path) -> AppResult<()> {
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(config_path, config_str)?;

    log::info!("Configuration saved to {}", config_path.display());
    Ok(())
}

pub fn validate_config(config: &UploaderConfig) -> AppResult<()> {
    if config.max_concurrent_uploads == 0 || config.max_concurrent_uploads > 10 {
        return Err(AppError::validation(
            "max_concurrent_uploads",
            "Must be between 1 and 10",
        ));
    }

    if config.max_file_size_bytes == 0 {
        return Err(AppError::validation(
            "max_file_size_bytes",
            "Must be greater than 0",
        ));
    }

    if config.accepted_mime_types.is_empty() {
        return Err(AppError::validation(
            "accepted_mime_types",
            "At least one MIME type must be accepted",
        ));
    }

    if let Some(bad) = config
        .accepted_mime_types
        .iter()
        .find(|m| !(m.starts_with("image/") || m.starts_with("video/")))
    {
        return Err(AppError::validation(
            "accepted_mime_types",
            &format!("Only image/* and video/* types are supported, got '{}'", bad),
        ));
    }

    if config.max_video_duration_secs == Some(0) {
        return Err(AppError::validation(
            "max_video_duration_secs",
            "Must be greater than 0 (use null to disable)",
        ));
    }

    if !(config.backend_url.starts_with("http://") || config.backend_url.starts_with("https://"))
    {
        return Err(AppError::validation(
            "backend_url",
            "Must be an http(s) URL",
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(AppError::validation(
            "request_timeout_secs",
            "Must be greater than 0",
        ));
    }

    if config.max_retry_attempts > 10 {
        return Err(AppError::validation(
            "max_retry_attempts",
            "Must be 10 or fewer",
        ));
    }

    if config.transfer_chunk_size < 1024 {
        return Err(AppError::validation(
            "transfer_chunk_size",
            "Must be at least 1024 bytes",
        ));
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::validation(
            "log_level",
            "Must be a valid log level",
        ));
    }

    Ok(())
}

// Reset configuration to defaults
pub fn reset_config() -> AppResult<()> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        let backup_path = config_path.with_extension("json.reset_backup");
        fs::copy(&config_path, &backup_path)?;
        log::info!("Existing config backed up to {}", backup_path.display());
    }

    save_config_to(&UploaderConfig::default(), &config_path)?;

    log::info!("Configuration reset to defaults");
    Ok(())
}
