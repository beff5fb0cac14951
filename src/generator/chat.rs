use super::{build_prompt, parse_generated, ArticleGenerator, GeneratedArticle};
use crate::config::GeneratorConfig;
use crate::content::types::Quote;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Article generator over an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletions {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletions {
    pub fn new(config: &GeneratorConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ArticleGenerator for ChatCompletions {
    async fn generate(&self, quote: &Quote) -> Result<GeneratedArticle> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("generator API key missing");
        };

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(quote),
            }],
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("chat completions request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat completions error {}: {}", status, body);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse chat completions response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("chat completions response has no message content")?;

        tracing::debug!(quote_id = quote.id, bytes = content.len(), "generator replied");
        parse_generated(&content)
    }
}
