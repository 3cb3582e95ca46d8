//! Chat backend for OpenAI-compatible HTTP APIs.
//!
//! Many hosted and self-hosted services expose the `/chat/completions`
//! surface with bearer-token auth, so one client covers them all; point it
//! at any base URL ending in a version segment (`https://host/v1`). The
//! reply text is read from `choices[0].message.content`, and availability
//! is probed against the `/models` listing.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::paperforge::backend::{BackendError, ChatBackend, ChatMessage};

const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatBackend {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatBackend {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        OpenAiCompatBackend {
            http: reqwest::Client::builder()
                .timeout(CHAT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn error_message(status: u16, payload: &Value) -> String {
    payload
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("chat completion failed with status {}", status))
}

#[async_trait]
impl ChatBackend for OpenAiCompatBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, BackendError> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .http
            .post(self.endpoint("/chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                BackendError::Transport(format!(
                    "chat completion request failed ({}): {}",
                    self.model, err
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }

        let body = response.json::<Value>().await.map_err(|err| {
            BackendError::MalformedResponse(format!("unable to parse chat reply: {}", err))
        })?;

        body.get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                BackendError::MalformedResponse(
                    "chat reply carried no choices[0].message.content field".to_string(),
                )
            })
    }

    async fn is_available(&self) -> bool {
        let request = self
            .http
            .get(self.endpoint("/models"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match request {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
