// src/paperforge/backends/mod.rs

pub mod ollama;
pub mod openai_compat;

pub use ollama::OllamaBackend;
pub use openai_compat::OpenAiCompatBackend;
