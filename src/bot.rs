use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, Me, MessageEntity, MessageEntityKind, ReplyParameters};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use crate::config::{Config, StartupConfig};
use crate::llm::LlmClient;
use crate::prompt::PromptStore;

/// Telegram's hard limit on message length.
const MAX_MESSAGE_LEN: usize = 4096;
/// Display cap for /getprompt, leaving headroom for the surrounding text.
const PROMPT_DISPLAY_LEN: usize = 4000;

const TEXT_ONLY_REPLY: &str = "I can only argue against text messages.";
const FAILURE_REPLY: &str = "Something went wrong while generating a response.";

/// Shared application state
pub struct AppState {
    llm: LlmClient,
    prompt: PromptStore,
    admins: HashSet<u64>,
}

impl AppState {
    pub fn new(config: &Config, prompt: PromptStore) -> Result<Self> {
        let llm = LlmClient::new(config.llm.clone())?;
        Ok(Self {
            llm,
            prompt,
            admins: config.telegram.admin_user_ids.clone(),
        })
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
enum Command {
    #[command(description = "how to use the bot.")]
    Start,
    #[command(description = "show usage instructions.")]
    Help,
    #[command(description = "set a custom system prompt (admins only).")]
    SetPrompt(String),
    #[command(description = "reset the system prompt to default (admins only).")]
    ResetPrompt,
    #[command(description = "show the current system prompt (admins only).")]
    GetPrompt,
}

/// Remove any registered webhook so long polling can take over. A stale
/// webhook (or another instance still shutting down) surfaces as a conflict;
/// retry a bounded number of times with a fixed delay before giving up.
pub async fn clear_webhook(bot: &Bot, startup: &StartupConfig) -> Result<()> {
    let attempts = startup.max_attempts.max(1);
    let delay = Duration::from_secs(startup.retry_delay_secs);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match bot.delete_webhook().drop_pending_updates(true).await {
            Ok(_) => {
                info!("Webhook cleared (attempt {})", attempt);
                return Ok(());
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "Failed to clear webhook (attempt {}/{}): {}",
                    attempt, attempts, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e).context("Exhausted webhook cleanup attempts");
            }
        }
    }
}

/// Start the Telegram bot
pub async fn run(bot: Bot, me: Me, state: Arc<AppState>) -> Result<()> {
    info!("Starting Telegram bot...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message, me: Me| is_trigger(&msg, me.username()))
                .endpoint(handle_trigger),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, me])
        .default_handler(|upd| async move {
            debug!("Ignoring update {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    me: Me,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Hey! Reply to any political message in this chat and tag me \
                     (@{}) — I'll generate a strong opposing argument.",
                    me.username()
                ),
            )
            .await?;
        }
        Command::Help => {
            bot.send_message(
                msg.chat.id,
                "How to use:\n\
                 1. Find a political post in this chat.\n\
                 2. Reply to it and mention me in your message.\n\
                 3. I'll respond with a fierce counter-argument.\n\n\
                 Admin commands:\n\
                 /setprompt <text> — set a custom system prompt\n\
                 /resetprompt — reset to the default prompt\n\
                 /getprompt — show the current system prompt",
            )
            .await?;
        }
        Command::SetPrompt(text) => {
            if !authorize(&bot, &msg, &state, "You are not authorized to change the prompt.")
                .await?
            {
                return Ok(());
            }
            let text = text.trim();
            if text.is_empty() {
                bot.send_message(msg.chat.id, "Usage: /setprompt <your new system prompt>")
                    .await?;
                return Ok(());
            }
            state.prompt.set(text.to_string()).await;
            info!("System prompt updated via /setprompt");
            bot.send_message(msg.chat.id, "System prompt updated.").await?;
        }
        Command::ResetPrompt => {
            if !authorize(&bot, &msg, &state, "You are not authorized to reset the prompt.")
                .await?
            {
                return Ok(());
            }
            state.prompt.reset().await;
            info!("System prompt reset via /resetprompt");
            bot.send_message(msg.chat.id, "System prompt reset to default.")
                .await?;
        }
        Command::GetPrompt => {
            if !authorize(&bot, &msg, &state, "You are not authorized to view the prompt.")
                .await?
            {
                return Ok(());
            }
            let prompt = state.prompt.get().await;
            bot.send_message(
                msg.chat.id,
                format!("Current system prompt:\n\n{}", display_prompt(&prompt)),
            )
            .await?;
        }
    }

    Ok(())
}

/// Admin-gate a command; on rejection, tell the caller and report false.
async fn authorize(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    denial: &str,
) -> ResponseResult<bool> {
    let allowed = msg
        .from
        .as_ref()
        .is_some_and(|user| is_admin(&state.admins, user.id.0));

    if !allowed {
        bot.send_message(msg.chat.id, denial).await?;
    }

    Ok(allowed)
}

/// An empty admin set admits everyone, so the first operator can bootstrap
/// the prompt before any ids are configured.
fn is_admin(admins: &HashSet<u64>, user_id: u64) -> bool {
    admins.is_empty() || admins.contains(&user_id)
}

/// A message triggers a rebuttal when it replies to another message and
/// mentions the bot, either as plain `@username` or as a clickable text
/// mention. Pure function of the message and the bot's own username.
fn is_trigger(msg: &Message, bot_username: &str) -> bool {
    if msg.reply_to_message().is_none() {
        return false;
    }

    let text = match msg.text().or_else(|| msg.caption()) {
        Some(t) => t,
        None => return false,
    };
    let entities = msg
        .entities()
        .or_else(|| msg.caption_entities())
        .unwrap_or(&[]);

    mentions_username(text, entities, bot_username)
}

/// Scan the entity list for a mention of `username`. Entity offsets and
/// lengths are UTF-16 code units (Telegram Bot API convention), so the text
/// is indexed in UTF-16 as well; entities that fall outside the text are
/// skipped. Usernames are ASCII, compared case-insensitively.
fn mentions_username(text: &str, entities: &[MessageEntity], username: &str) -> bool {
    let utf16: Vec<u16> = text.encode_utf16().collect();

    for entity in entities {
        match &entity.kind {
            MessageEntityKind::Mention => {
                let Some(slice) = entity
                    .offset
                    .checked_add(entity.length)
                    .and_then(|end| utf16.get(entity.offset..end))
                else {
                    continue;
                };
                let mention = String::from_utf16_lossy(slice);
                if mention
                    .strip_prefix('@')
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
                {
                    return true;
                }
            }
            MessageEntityKind::TextMention { user } => {
                if user
                    .username
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
                {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}

async fn handle_trigger(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // The trigger filter guarantees the reply reference exists.
    let Some(quoted) = msg.reply_to_message() else {
        return Ok(());
    };

    info!(
        "Triggered by message {} in chat {} (quoting message {})",
        msg.id.0, msg.chat.id, quoted.id.0
    );

    let subject = match subject_text(quoted) {
        Some(text) => text.to_string(),
        None => {
            bot.send_message(msg.chat.id, TEXT_ONLY_REPLY)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
            return Ok(());
        }
    };

    // Best-effort typing indicator while the completion runs.
    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    let system_prompt = state.prompt.get().await;

    match state.llm.complete(&system_prompt, &subject).await {
        Ok(reply) => {
            // The rebuttal goes on the original post, not on whoever tagged us.
            bot.send_message(msg.chat.id, truncate_reply(reply))
                .reply_parameters(ReplyParameters::new(quoted.id))
                .await?;
            info!("Posted rebuttal for message {}", quoted.id.0);
        }
        Err(e) => {
            error!("Failed to generate rebuttal: {:#}", e);
            bot.send_message(msg.chat.id, FAILURE_REPLY)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
    }

    Ok(())
}

/// The content the rebuttal argues against: the quoted message's text, else
/// its caption. Media without a caption has nothing to argue with.
fn subject_text(quoted: &Message) -> Option<&str> {
    quoted.text().or_else(|| quoted.caption())
}

/// Telegram rejects messages over 4096 characters; cut and mark instead.
fn truncate_reply(reply: String) -> String {
    if reply.chars().count() <= MAX_MESSAGE_LEN {
        return reply;
    }
    let mut truncated: String = reply.chars().take(MAX_MESSAGE_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}

fn display_prompt(prompt: &str) -> String {
    if prompt.chars().count() <= PROMPT_DISPLAY_LEN {
        return prompt.to_string();
    }
    let head: String = prompt.chars().take(PROMPT_DISPLAY_LEN).collect();
    format!("{}\n\n[truncated]", head)
}
