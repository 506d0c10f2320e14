mod config;
mod dispatcher;
mod extract;
mod fetch;
mod pipeline;
mod platform;
mod scheduler;
mod tempfiles;
mod transcode;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::platform::telegram::{self, TelegramChat};
use crate::scheduler::{tasks, Housekeeper};
use crate::transcode::{FfmpegEngine, Transcoder};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration: optional TOML file, environment on top
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };

    // Initialize logging
    let default_filter = if config.debug {
        "info,webmbot=debug"
    } else {
        "info,webmbot=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded successfully");
    info!("  Notify mode: {}", config.notify_mode);
    info!("  Temp dir: {}", config.temp_dir.display());
    info!("  ffmpeg: {}", config.pipeline.ffmpeg_path.display());
    match config.run_limit() {
        Some(n) => info!("  Max concurrent runs: {}", n),
        None => info!("  Max concurrent runs: unbounded"),
    }

    let bot = Bot::new(&config.telegram.bot_token);
    let identity = telegram::identify(&bot).await?;

    // Leftovers from a previous process, then keep sweeping periodically
    tasks::sweep_temp_dir(config.temp_dir.clone(), config.stale_file_age()).await;
    let housekeeper = Housekeeper::start(config.temp_dir.clone(), config.stale_file_age()).await?;

    let fetcher = Fetcher::new(config.temp_dir.clone(), config.download_timeout())?;
    let engine = Arc::new(FfmpegEngine::new(config.pipeline.ffmpeg_path.clone()));
    let transcoder = Transcoder::new(engine, config.convert_timeout());
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(TelegramChat::new(bot.clone())),
        fetcher,
        transcoder,
        config.notify_mode,
        config.upload_timeout(),
    ));

    let dispatcher = Dispatcher::new(pipeline, identity, config.run_limit());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let event_loop = tokio::spawn(dispatcher.run(events_rx));

    info!("Bot is starting...");
    telegram::run(bot, events_tx).await?;

    event_loop.await.context("Dispatcher task failed")?;
    housekeeper.stop().await?;

    info!("Bye");
    Ok(())
}
