mod bot;
mod config;
mod display;
mod fanout;
mod logging;
mod quotes;
mod scheduler;

use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use log::{error, info};
use reqwest::Client;
use serenity::all::GatewayIntents;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::bot::Handler;
use crate::config::Config;
use crate::fanout::DiscordGuilds;
use crate::quotes::AlphaVantageQuoteSource;
use crate::scheduler::Scheduler;

const QUOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to initialize bot: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&config.log_file) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "Bot initialized with update interval: {} minutes",
        config.interval_minutes()
    );
    info!("{:?}", config);

    match run(config).await {
        Ok(()) => {
            info!("Bot shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let http = Client::builder()
        .user_agent(concat!("tickernick/", env!("CARGO_PKG_VERSION")))
        .timeout(QUOTE_TIMEOUT)
        .build()
        .context("Failed to build quote HTTP client")?;
    let source = AlphaVantageQuoteSource::new(Arc::new(http), config.alpha_vantage_key.clone());

    let (ready_tx, ready_rx) = oneshot::channel();
    let mut client = serenity::Client::builder(&config.discord_token, GatewayIntents::GUILDS)
        .event_handler(Handler::new(ready_tx))
        .await
        .context("Failed to create Discord client")?;

    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(source, config.symbol.clone(), config.update_interval);
    let scheduler_task = tokio::spawn(scheduler.run(
        async move { ready_rx.await.ok().map(DiscordGuilds::new) },
        shutdown.clone(),
    ));

    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, shutting down...");
                interrupt.cancel();
            }
            Err(e) => error!("Cannot listen for interrupt signal: {}", e),
        }
    });

    // The gateway is released only after the in-flight tick has finished.
    let shard_manager = client.shard_manager.clone();
    let stopping = shutdown.clone();
    let coordinator = tokio::spawn(async move {
        stopping.cancelled().await;
        info!("Shutting down bot...");
        if let Err(e) = scheduler_task.await {
            error!("Price update task ended abnormally: {}", e);
        }
        shard_manager.shutdown_all().await;
    });

    let started = client.start().await;
    shutdown.cancel();
    if let Err(e) = coordinator.await {
        error!("Shutdown coordinator ended abnormally: {}", e);
    }
    started.context("Discord client stopped with an error")
}
