// src/main.rs
use clap::Parser;
use fanout_cache::{
    config::load_config,
    error::FetchError,
    media::{JsonFileSource, MediaResource, MediaService},
    utils::setup_logging,
};
use futures::future::join_all;
use log::{info, warn};
use std::{path::PathBuf, sync::Arc};

#[derive(Debug, Parser)]
#[command(
    name = "fanout-cache",
    about = "Serve cached, transformed media collections from an account snapshot"
)]
struct Cli {
    /// JSON document with the account snapshots to serve
    #[arg(long)]
    source: PathBuf,

    #[arg(long, value_enum, default_value_t = MediaResource::Reels)]
    resource: MediaResource,

    /// Number of concurrent requests for the resource
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<(), FetchError> {
    let cli = Cli::parse();

    let app_config = load_config()?;
    setup_logging(app_config.log_level_filter())
        .map_err(|e| FetchError::Config(format!("logging setup failed: {}", e)))?;
    app_config.validate_and_log();

    let source = Arc::new(JsonFileSource::load(&cli.source).await?);
    let service = MediaService::new(source, &app_config);

    let repeat = cli.repeat.max(1);
    info!("Requesting {} x{}", cli.resource, repeat);
    let mut responses = join_all((0..repeat).map(|_| service.fetch(cli.resource))).await;

    let field = cli.resource.field_name();
    let first_items = responses[0].body.get(field);
    let distinct = responses
        .iter()
        .filter(|r| r.body.get(field) != first_items)
        .count();
    if distinct > 0 {
        warn!("{} of {} responses differ from the first", distinct, repeat);
    }

    service.log_stats().await;

    let response = responses.swap_remove(0);
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response.body)?
    } else {
        serde_json::to_string(&response.body)?
    };
    println!("{}", rendered);

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
