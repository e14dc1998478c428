//! HTTP client for the code-generation backend.

use super::transcript::{ChatMessage, Transcript};
use crate::errors::ChatError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Something that turns a conversation into the next action-log document.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, transcript: &Transcript) -> Result<String, ChatError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

/// Posts the transcript to `{api_url}/chat`.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatClient {
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat", api_url.trim_end_matches('/')),
        }
    }

    /// Build a client whose requests give up after `timeout`.
    pub fn with_timeout(api_url: &str, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            ..Self::new(api_url)
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn send(&self, transcript: &Transcript) -> Result<String, ChatError> {
        debug!(endpoint = %self.endpoint, messages = transcript.len(), "sending chat request");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&ChatRequest {
                messages: &transcript.messages,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = resp.json().await?;
        debug!(bytes = reply.response.len(), "chat response received");
        Ok(reply.response)
    }
}
