//! Maintenance commands for a deployed bot.
//!
//! `counterbot-status status [config.toml]` prints the bot identity and
//! webhook state; `counterbot-status delete-webhook [config.toml]` clears a
//! registered webhook (dropping pending updates) so long polling can be used.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use teloxide::prelude::*;

// Loose parse — only the token is needed here, partial configs still load.
#[derive(Deserialize)]
struct RawConfig {
    telegram: RawTelegram,
}

#[derive(Deserialize)]
struct RawTelegram {
    bot_token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "status".to_string());
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let config: RawConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    let bot = Bot::new(&config.telegram.bot_token);

    match command.as_str() {
        "status" => status(&bot).await,
        "delete-webhook" => delete_webhook(&bot).await,
        other => anyhow::bail!(
            "Unknown command: {} (expected 'status' or 'delete-webhook')",
            other
        ),
    }
}

async fn status(bot: &Bot) -> Result<()> {
    let me = bot
        .get_me()
        .await
        .context("getMe failed (bad bot token?)")?;

    println!("Bot: @{} (id {})", me.username(), me.id);
    println!("Name: {}", me.first_name);
    println!("Can join groups: {}", me.can_join_groups);
    println!(
        "Can read all group messages: {}",
        me.can_read_all_group_messages
    );

    let info = bot
        .get_webhook_info()
        .await
        .context("getWebhookInfo failed")?;

    match &info.url {
        Some(url) => {
            println!("Webhook: {}", url);
            println!("Pending updates: {}", info.pending_update_count);
            println!("Note: a webhook blocks long polling; run 'delete-webhook' to clear it.");
        }
        None => {
            println!("Webhook: none (long polling available)");
            println!("Pending updates: {}", info.pending_update_count);
        }
    }

    Ok(())
}

async fn delete_webhook(bot: &Bot) -> Result<()> {
    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .context("deleteWebhook failed")?;

    println!("Webhook deleted; long polling can be used.");
    Ok(())
}
