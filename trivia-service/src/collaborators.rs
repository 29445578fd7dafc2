// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LlmConfig;

#[async_trait]
pub trait QuestionModel: Send + Sync {
    async fn text_chat(&self, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait EconomyApi: Send + Sync {
    async fn ready(&self) -> anyhow::Result<bool>;
    async fn add_coins(&self, user_id: &str, amount: u32, reason: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, origin: &str, text: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(client: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl QuestionModel for OpenAiChatModel {
    async fn text_chat(&self, prompt: &str) -> anyhow::Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("failed to call language model")?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("failed to read language model response body")?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            anyhow::bail!("language model returned {status}: {text}");
        }

        let completion: ChatCompletionResponse =
            serde_json::from_slice(&bytes).context("invalid language model payload")?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("language model response has no completion text"))
    }
}

#[derive(Clone)]
pub struct HttpEconomyApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEconomyApi {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl EconomyApi for HttpEconomyApi {
    async fn ready(&self) -> anyhow::Result<bool> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .timeout(Duration::from_millis(800))
            .send()
            .await
            .context("failed to probe economy service")?;
        Ok(response.status().is_success())
    }

    async fn add_coins(&self, user_id: &str, amount: u32, reason: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "user_id": user_id,
            "amount": amount,
            "reason": reason,
        });
        let response = self
            .client
            .post(self.endpoint("internal/v1/coins"))
            .timeout(Duration::from_secs(5))
            .json(&payload)
            .send()
            .await
            .context("failed to call economy service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("economy service returned {status}: {body}");
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct HttpMessageSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageSender {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn send_message(&self, origin: &str, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/internal/v1/messages",
            self.base_url.trim_end_matches('/')
        );
        let payload = serde_json::json!({ "origin": origin, "text": text });
        let response = self
            .client
            .post(url)
            .timeout(Duration::from_secs(5))
            .json(&payload)
            .send()
            .await
            .context("failed to call host messaging endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "".to_string());
            anyhow::bail!("host messaging returned {status}: {body}");
        }

        Ok(())
    }
}

/// Polls the economy service until it reports ready or `timeout` elapses.
pub async fn wait_for_economy(
    economy: Arc<dyn EconomyApi>,
    timeout: Duration,
    poll_interval: Duration,
) -> Option<Arc<dyn EconomyApi>> {
    info!(timeout_secs = timeout.as_secs(), "waiting for economy api");
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match economy.ready().await {
            Ok(true) => {
                info!("economy api is ready");
                return Some(economy);
            }
            Ok(false) => {}
            Err(error) => {
                tracing::debug!(error = %error, "economy api probe failed");
            }
        }

        if tokio::time::Instant::now() >= deadline {
            warn!(
                timeout_secs = timeout.as_secs(),
                "timed out waiting for economy api; rewards stay disabled"
            );
            return None;
        }

        tokio::time::sleep(poll_interval).await;
    }
}
