mod bot;
mod commands;
mod config;
mod editing;
mod platform;
mod processor;
mod status;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::processor::timestamps::TimestampConverter;
use crate::processor::TextProcessor;
use crate::status::StatusState;
use crate::store::channels::ChannelStore;
use crate::store::filters::FilterStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chanedit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Source timezone: {}", config.timezone.source);
    info!("  Target timezone: {}", config.timezone.target);
    info!("  Built-in filters: {}", config.filters.builtin.len());
    info!("  Channels file: {}", config.storage.channels_file.display());
    info!("  Filters file: {}", config.storage.filters_file.display());

    let timestamps = TimestampConverter::new(&config.timezone, &config.timestamps)
        .context("Invalid timestamp configuration")?;

    let filters = Arc::new(FilterStore::new(
        config.storage.filters_file.clone(),
        config.filters.builtin.clone(),
    ));
    let channels = Arc::new(ChannelStore::new(
        config.storage.channels_file.clone(),
        config.default_channel().map(str::to_string),
    ));

    if channels.is_empty() {
        warn!("No monitored channels. The bot will process all channels it's added to.");
    }
    if filters.is_empty() {
        info!("No user-defined filters yet");
    }

    // Status page runs beside the bot
    let status_state = StatusState {
        channels: channels.clone(),
        filters: filters.clone(),
        source_timezone: config.timezone.source.clone(),
        target_timezone: config.timezone.target.clone(),
    };
    let listener = status::bind(&config.status).await?;
    tokio::spawn(async move {
        if let Err(e) = status::serve(listener, status_state).await {
            error!("{:#}", e);
        }
    });

    let processor = TextProcessor::new(filters.clone(), timestamps);
    let state = Arc::new(AppState::new(config, channels, filters, processor));

    info!("Bot is starting...");
    platform::telegram::run(state).await?;

    Ok(())
}
