//! ============================================================================
//! LLM Client - OpenAI-compatible chat completions over reqwest
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::AiModel;

/// One system + one user message in, assistant text out
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, model: AiModel, system: &str, user: &str) -> Result<String>;
}

/// Client for any endpoint speaking the chat-completions protocol
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ChatCompletionsClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, model: AiModel, system: &str, user: &str) -> Result<String> {
        debug!(
            "Calling {} ({}) with {} chars",
            model.display_name(),
            model.provider_model(),
            system.len() + user.len()
        );

        let request = ChatRequest {
            model: model.provider_model().to_string(),
            messages: vec![
                ApiMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ApiMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(0.7),
            max_tokens: Some(1024),
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call LLM API: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API error {}: {}", status, body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse API response: {}", e))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from API"))
    }
}

/// Strip a markdown fence from a model reply so the JSON inside can be parsed.
///
/// Takes the text between the first pair of ``` markers, dropping a `json`
/// language tag. Replies without a fence are only trimmed.
pub fn clean_json_reply(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let inner = &trimmed[start + 3..];
    let inner = match inner.find("```") {
        Some(end) => &inner[..end],
        None => inner,
    };
    let inner = inner.trim_start();
    inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner)
        .trim()
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_reply_with_fence() {
        let reply = "Sure!\n```json\n{\"emoji\": \"📚\"}\n```\nanything else";
        assert_eq!(clean_json_reply(reply), "{\"emoji\": \"📚\"}");
    }

    #[test]
    fn test_clean_json_reply_bare_fence() {
        let reply = "```\n{\"subtasks\": []}\n```";
        assert_eq!(clean_json_reply(reply), "{\"subtasks\": []}");
    }

    #[test]
    fn test_clean_json_reply_plain() {
        assert_eq!(clean_json_reply("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_reply_unclosed_fence() {
        assert_eq!(clean_json_reply("```json {\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: AiModel::Gpt4o.provider_model().to_string(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: None,
            max_tokens: Some(10),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 10);
    }
}
