// src/llm/openai.rs

//! Low-level OpenAI API client for embeddings and chat completions.
//! No wrappers; just reqwest and Rust.

use crate::config::BotConfig;
use crate::error::{ReviewError, Result};
use crate::llm::{ChatClient, ChatMessage, EmbeddingClient};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    chat_model: String,
    embedding_model: String,
}

impl OpenAIClient {
    pub fn new(config: &BotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.openai_timeout))
            .build()?;
        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            api_base: config.openai_base_url.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn auth_header(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.api_base);
        let req_body = json!({
            "input": text,
            "model": self.embedding_model,
        });
        let resp = self
            .client
            .post(&url)
            .header(self.auth_header().0, self.auth_header().1.clone())
            .json(&req_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ReviewError::Retrieval(format!(
                "embedding request failed: {}",
                resp.text().await.unwrap_or_default()
            )));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        let embedding = resp_json["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| ReviewError::Retrieval("no embedding in response".to_string()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        Ok(embedding)
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": self.chat_model,
            "messages": messages,
            "temperature": 0.2,
        });

        let resp = self
            .client
            .post(&url)
            .header(self.auth_header().0, self.auth_header().1.clone())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ReviewError::ExternalApi(format!(
                "chat completion failed: {}",
                resp.text().await.unwrap_or_default()
            )));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ReviewError::ModelResponse("no content in chat response".to_string()))?
            .to_string();

        Ok(content)
    }
}
