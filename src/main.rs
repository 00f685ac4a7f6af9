mod bot;
mod config;
mod health;
mod llm;
mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::prompt::PromptStore;

/// Environment variable consulted between the runtime override and the
/// prompt file when resolving the system prompt.
const SYSTEM_PROMPT_ENV: &str = "COUNTERBOT_SYSTEM_PROMPT";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,counterbot=debug".into()),
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
    info!("  Model: {}", config.llm.model);
    info!("  Admins: {:?}", config.telegram.admin_user_ids);
    info!("  Worker mode: {}", config.server.worker_mode);

    let telegram_bot = Bot::new(&config.telegram.bot_token);

    // Resolve our own identity; the mention detector needs the username,
    // and a failure here means the token is bad.
    let me = telegram_bot
        .get_me()
        .await
        .context("Failed to resolve bot identity (bad bot token?)")?;
    info!("Authenticated as @{} ({})", me.username(), me.id);

    // A leftover webhook blocks long polling with conflicts; clear it first.
    bot::clear_webhook(&telegram_bot, &config.startup).await?;

    if !config.server.worker_mode {
        health::spawn(config.server.port).await?;
    }

    let prompt = PromptStore::new(SYSTEM_PROMPT_ENV, config.llm.prompt_file.clone());
    let state = Arc::new(AppState::new(&config, prompt)?);

    info!("Bot is starting...");
    bot::run(telegram_bot, me, state).await
}
