use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// A ChatBackend is a wrapper around one reachable LLM service.
/// It provides a common interface to talk to the model behind it.
/// It does not keep track of the conversation; transcripts live in a
/// [`Session`](crate::paperforge::session::Session) and are replayed to the
/// backend on every call.

/// Represents the possible roles for a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Set by the application to steer the model's responses.
    System,
    /// A message written by the end user.
    User,
    /// Content the model produced in response to a user message.
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A generic chat message to be sent to an LLM backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role associated with the message.
    pub role: ChatRole,
    /// The actual content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Error raised by a [`ChatBackend`] call.
///
/// A backend must fail with one of these variants rather than return an
/// empty success, so callers can tell a degraded service from a model that
/// genuinely answered with nothing.
#[derive(Debug)]
pub enum BackendError {
    /// The HTTP request could not be completed (connect, timeout, DNS, ...).
    Transport(String),
    /// The service answered with a non-2xx status.
    Api { status: u16, message: String },
    /// The service answered 2xx but the body did not carry a usable reply.
    MalformedResponse(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(msg) => write!(f, "transport error: {}", msg),
            BackendError::Api { status, message } => {
                write!(f, "backend returned status {}: {}", status, message)
            }
            BackendError::MalformedResponse(msg) => {
                write!(f, "malformed backend response: {}", msg)
            }
        }
    }
}

impl Error for BackendError {}

/// Trait defining the interface to a chat-capable LLM service.
///
/// Implementations are stateless beyond their own connection parameters and
/// are owned exclusively by the
/// [`BackendRegistry`](crate::paperforge::registry::BackendRegistry).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a transcript to the model and return the assistant's reply text.
    ///
    /// `messages` carries between 1 and ~50 entries; `temperature` and
    /// `max_tokens` are per-call sampling bounds supplied by the role
    /// configuration of the caller.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, BackendError>;

    /// Cheap reachability probe used when loading the registry.
    async fn is_available(&self) -> bool;
}
