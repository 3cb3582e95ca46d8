//! Named registry of chat-capable LLM backends.
//!
//! The registry owns every [`ChatBackend`] the process knows about, keyed by
//! name and remembered in registration order so that `get(None)` and the
//! round-robin role assignment are deterministic. It is built once at
//! startup (usually via [`BackendRegistry::from_env`]) and shared read-only
//! behind an `Arc` for the lifetime of the process; reloading backends
//! requires a restart.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paperforge::backend::ChatMessage;
//! use paperforge::backends::OllamaBackend;
//! use paperforge::registry::BackendRegistry;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = BackendRegistry::new();
//! registry.register("ollama", Arc::new(OllamaBackend::new("http://localhost:11434", "llama2")));
//!
//! let reply = registry
//!     .chat(&[ChatMessage::user("Say hi.")], None, 0.7, 256)
//!     .await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

use log::{info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::paperforge::backend::{BackendError, ChatBackend, ChatMessage};
use crate::paperforge::backends::{OllamaBackend, OpenAiCompatBackend};

/// Errors raised when dispatching a chat call through the registry.
#[derive(Debug)]
pub enum RegistryError {
    /// No backend is registered, or the requested name is unknown.
    NoBackendAvailable,
    /// The selected backend accepted the call but failed to complete it.
    Backend(BackendError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NoBackendAvailable => write!(f, "no LLM backend is available"),
            RegistryError::Backend(err) => write!(f, "backend call failed: {}", err),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for RegistryError {
    fn from(err: BackendError) -> Self {
        RegistryError::Backend(err)
    }
}

/// Holds zero or more named backends, each independently reachable.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn ChatBackend>>,
    // Preserve registration order for get(None) and role round-robin.
    order: Vec<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        BackendRegistry {
            backends: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a backend under `name`. Re-registering a name replaces the
    /// backend but keeps its original position in the ordering.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn ChatBackend>) {
        let name = name.into();
        if self.backends.insert(name.clone(), backend).is_none() {
            self.order.push(name);
        }
    }

    /// Look up a backend by name, or the first registered one for `None`.
    ///
    /// Callers must not depend on *which* backend `get(None)` yields, only
    /// that it is stable for the lifetime of the registry.
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn ChatBackend>> {
        match name {
            Some(name) => self.backends.get(name).cloned(),
            None => self
                .order
                .first()
                .and_then(|first| self.backends.get(first))
                .cloned(),
        }
    }

    /// Backend names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Dispatch a chat call to the named backend (or the first available
    /// one). Fails with [`RegistryError::NoBackendAvailable`] when nothing
    /// usable is registered; callers turn that into a degraded response
    /// rather than a crash.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        backend_name: Option<&str>,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, RegistryError> {
        let backend = self
            .get(backend_name)
            .ok_or(RegistryError::NoBackendAvailable)?;
        let reply = backend.chat(messages, temperature, max_tokens).await?;
        Ok(reply)
    }

    /// Load every backend described by the environment.
    ///
    /// `OLLAMA_BASE_URL` enables a local Ollama backend (registered only if
    /// its probe succeeds), and the numbered triples `API_KEY_n` /
    /// `API_BASE_URL_n` / `API_MODEL_n` enable OpenAI-compatible backends
    /// named `api_<n>_<model>`. Numbering stops at the first gap. An empty
    /// result is not an error here; dispatch will degrade per call instead.
    pub async fn from_env() -> Self {
        let mut registry = BackendRegistry::new();

        if std::env::var("OLLAMA_BASE_URL").is_ok() {
            let ollama = OllamaBackend::from_env();
            if ollama.is_available().await {
                info!("registered Ollama backend (model {})", ollama.model());
                registry.register("ollama", Arc::new(ollama));
            } else {
                warn!("Ollama configured but unreachable; skipping");
            }
        }

        let mut index = 1;
        loop {
            let api_key = std::env::var(format!("API_KEY_{}", index));
            let base_url = std::env::var(format!("API_BASE_URL_{}", index));
            let model = std::env::var(format!("API_MODEL_{}", index));

            let (api_key, base_url, model) = match (api_key, base_url, model) {
                (Ok(key), Ok(url), Ok(model)) => (key, url, model),
                _ => break,
            };

            let name = format!("api_{}_{}", index, model);
            info!("registered OpenAI-compatible backend: {}", name);
            registry.register(name, Arc::new(OpenAiCompatBackend::new(api_key, base_url, model)));
            index += 1;
        }

        if registry.is_empty() {
            warn!("no LLM backends registered; check OLLAMA_BASE_URL / API_KEY_n settings");
        }

        registry
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
