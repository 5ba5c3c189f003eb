//! reelpress - migrate WordPress movie posts with TMDB metadata
//!
//! Reads a WXR export, resolves movie metadata and posters for each post
//! through the local cache, and prints the migrated records as JSON.

use clap::Parser;
use reqwest::Client;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelpress::cli::Cli;
use reelpress::config::{MigrateConfig, ENV_API_KEY};
use reelpress::data::{parse_export, TmdbClient};
use reelpress::migrate::Migrator;

/// Initialize the tracing subscriber for logging.
///
/// Log level comes from `RUST_LOG`, defaulting to INFO. Logs go to stderr so
/// stdout carries only the migrated records.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reelpress=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = MigrateConfig::from_env()?;
    let export_path = cli.export_path(&std::env::current_dir()?);
    info!(export = %export_path.display(), cache = %config.cache_dir.display(), "starting migration");

    let xml = tokio::fs::read(&export_path)
        .await
        .map_err(|e| format!("cannot read {}: {}", export_path.display(), e))?;
    let posts = parse_export(&xml)?;

    let api_key = config.api_key.clone().unwrap_or_else(|| {
        warn!("{} is not set; only cached metadata will resolve", ENV_API_KEY);
        String::new()
    });
    let http = Client::new();
    let service = TmdbClient::with_base_url(http.clone(), api_key, config.api_base_url.clone());
    let migrator = Migrator::new(service, http, &config);

    let migrated = migrator.migrate_all(posts).await;
    println!("{}", serde_json::to_string_pretty(&migrated)?);

    Ok(())
}
