use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Sampling temperature for counter-argument generation.
const TEMPERATURE: f64 = 0.9;
/// Upper bound on generated tokens per completion.
const MAX_COMPLETION_TOKENS: u32 = 1024;
/// Hard cap on how long one backend call may run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

impl ChatRequest {
    fn new(model: String, system: &str, user: &str) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// One chat-completions call: system prompt plus the statement to argue
    /// against. No retries; the caller decides what a failure means.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest::new(self.config.model.clone(), system, user);

        let url = format!("{}/chat/completions", self.config.base_url);

        debug!("Sending completion request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to completion backend")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion backend error ({}): {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        extract_reply(chat_response)
    }
}

/// First choice's content, trimmed; a missing or blank completion is an error.
fn extract_reply(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    let trimmed = content.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Completion backend returned an empty response");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_fixed_generation_parameters() {
        let request = ChatRequest::new("gpt-4o-mini".to_string(), "sys", "usr");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert!((value["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-9);
        assert_eq!(value["max_tokens"], 1024);
    }

    #[test]
    fn request_has_exactly_two_role_tagged_messages() {
        let request = ChatRequest::new("m".to_string(), "be fierce", "Taxes should be raised.");
        let value = serde_json::to_value(&request).unwrap();

        let messages = value["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be fierce");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Taxes should be raised.");
    }

    #[test]
    fn extract_reply_trims_whitespace() {
        let response = ChatResponse {
            choices: vec![Choice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: "  a counter-argument \n".to_string(),
                },
            }],
        };

        assert_eq!(extract_reply(response).unwrap(), "a counter-argument");
    }

    #[test]
    fn blank_completion_is_an_error() {
        let response = ChatResponse {
            choices: vec![Choice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: "   ".to_string(),
                },
            }],
        };

        assert!(extract_reply(response).is_err());
    }

    #[test]
    fn missing_choices_is_an_error() {
        let response = ChatResponse { choices: vec![] };

        assert!(extract_reply(response).is_err());
    }
}
