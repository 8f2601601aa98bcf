use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ChatError;

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
}

/// Expected reply body
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub response: Option<String>,
}

/// Anything that can carry one chat message to the assistant and bring
/// one reply back.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &str) -> Result<String, ChatError>;
}

/// Decode a reply body. The `response` field is taken verbatim.
pub fn parse_reply(body: &[u8]) -> Result<String, ChatError> {
    let reply: ChatReply = serde_json::from_slice(body)?;
    reply.response.ok_or(ChatError::MissingField("response"))
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(base_url: &str, chat_path: &str) -> Self {
        Self::with_client(Client::new(), base_url, chat_path)
    }

    pub fn with_client(client: Client, base_url: &str, chat_path: &str) -> Self {
        Self {
            client,
            endpoint: join_endpoint(base_url, chat_path),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let transport = Self::new(&config.server_url(), &config.chat_path());
        match config.request_timeout() {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        }
    }

    /// Without a timeout the client's own defaults apply.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, message: &str) -> Result<String, ChatError> {
        let request = ChatRequest {
            message: message.to_string(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;

        // The status is not checked: a well-formed body is a reply either way.
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, endpoint = %self.endpoint, "chat endpoint returned non-success status");
        }

        let body = response.bytes().await?;
        parse_reply(&body)
    }
}

fn join_endpoint(base_url: &str, chat_path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = chat_path.trim_start_matches('/');
    format!("{}/{}", base, path)
}
