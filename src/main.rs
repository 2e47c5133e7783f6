use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

use recipe_uploader::cli::Cli;
use recipe_uploader::config::{self, validate_config};
use recipe_uploader::uploader::{HttpBackend, UploadQueue};
use recipe_uploader::{AppError, SourceFile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging before the config is read so its warnings show up.
    // RUST_LOG wins over the configured level when set.
    let env_filter = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .init();
    if !env_filter {
        log::set_max_level(log::LevelFilter::Info);
    }

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .context("Failed to load configuration")?;
    let config = cli.apply_overrides(config);
    validate_config(&config)?;
    if !env_filter {
        log::set_max_level(config.log_level_filter());
    }

    log::info!("Starting Recipe Uploader");

    let backend = Arc::new(HttpBackend::new(&config)?);
    let mut queue = UploadQueue::new(&config, backend);

    let mut files = Vec::new();
    for path in &cli.media {
        match SourceFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(AppError::FileNotFound { path }) => log::error!("File not found: {}", path),
            Err(e) => log::error!("Skipping {}: {}", path, e),
        }
    }

    let report = queue.select_files(files).await;
    log::info!(
        "{} file(s) queued, {} rejected",
        report.accepted.len(),
        report.rejected.len()
    );

    let summary = queue.run_until_settled().await;
    log::info!(
        "Uploads settled: {} uploaded, {} failed",
        summary.uploaded,
        summary.failed
    );

    match queue.submit(cli.recipe_form()).await {
        Ok(post_id) => {
            println!("{}", post_id);
            Ok(())
        }
        Err(e) => {
            log::error!("Could not post recipe ({}): {}", e.code(), e);
            queue.close().await;
            Err(e.into())
        }
    }
}
