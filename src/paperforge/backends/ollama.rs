//! Chat backend for a local Ollama server.
//!
//! Speaks the `/api/chat` wire format in non-streaming mode: temperature and
//! the output ceiling travel in the `options` object (`num_predict` is
//! Ollama's name for max tokens), and the reply text comes back under
//! `message.content`. Availability is probed against `/api/tags`, which
//! answers quickly whether or not any model is loaded.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::paperforge::backend::{BackendError, ChatBackend, ChatMessage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama2";

/// Request timeout for chat calls; generation on CPU-bound hosts is slow.
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
/// Probe timeout; availability checks must not hold up registry loading.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Client for an Ollama-style chat endpoint.
pub struct OllamaBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        OllamaBackend {
            http: reqwest::Client::builder()
                .timeout(CHAT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Build a backend from `OLLAMA_BASE_URL` / `OLLAMA_DEFAULT_MODEL`,
    /// falling back to the conventional local defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("OLLAMA_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(base_url, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn error_message(status: u16, payload: &Value) -> String {
    payload
        .get("error")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("Ollama request failed with status {}", status))
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, BackendError> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        });

        let response = self
            .http
            .post(endpoint(&self.base_url, "/api/chat"))
            .json(&payload)
            .send()
            .await
            .map_err(|err| BackendError::Transport(format!("Ollama request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }

        let body = response.json::<Value>().await.map_err(|err| {
            BackendError::MalformedResponse(format!("unable to parse Ollama reply: {}", err))
        })?;

        body.get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                BackendError::MalformedResponse(
                    "Ollama reply carried no message.content field".to_string(),
                )
            })
    }

    async fn is_available(&self) -> bool {
        let request = self
            .http
            .get(endpoint(&self.base_url, "/api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match request {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
