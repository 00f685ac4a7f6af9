use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_startup_config")]
    pub startup: StartupConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// User ids allowed to run the prompt commands. An empty list admits
    /// everyone, so the first operator can bootstrap the prompt.
    #[serde(default)]
    pub admin_user_ids: HashSet<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// File consulted for the system prompt when no runtime override or
    /// environment value is present.
    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Background-worker deployments have no inbound HTTP, so the
    /// health-check server is skipped.
    #[serde(default)]
    pub worker_mode: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StartupConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("config/prompt.txt")
}

fn default_port() -> u16 {
    3000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        port: default_port(),
        worker_mode: false,
    }
}

fn default_startup_config() -> StartupConfig {
    StartupConfig {
        max_attempts: default_max_attempts(),
        retry_delay_secs: default_retry_delay_secs(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token is required");
        }
        if config.llm.api_key.trim().is_empty() {
            anyhow::bail!("llm.api_key is required");
        }

        Ok(config)
    }
}
