//! # PaperForge
//!
//! PaperForge orchestrates multiple LLM backends to collaboratively draft an
//! academic paper through a multi-turn, stage-gated dialogue.
//!
//! The crate provides layered abstractions for:
//!
//! * **Backend Registry**: [`BackendRegistry`] holds named chat-capable
//!   backends ([`backend::ChatBackend`] implementations for Ollama and any
//!   OpenAI-compatible endpoint) and dispatches calls with per-call sampling
//!   bounds.
//! * **Role Assignment**: [`roles::RoleAssignments`] maps the four fixed
//!   collaboration roles (collector, generator, reviewer, optimizer) onto
//!   registered backends, round-robin when several are available.
//! * **Sessions**: [`SessionStore`] keeps the append-only transcript and the
//!   accumulated context of each paper project in one JSON file per session.
//! * **Collaborative Generation**: [`CollaborationEngine`] drives the
//!   generate, review, optimize, improve cycle that refines each paper
//!   section, preserving partial progress on backend failure.
//! * **Stage Controller**: [`PaperGenerator`] walks the interview stages,
//!   scores completeness every turn, and assembles the full paper once
//!   enough has been gathered or the round ceiling is reached.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paperforge::config::PaperForgeConfig;
//! use paperforge::extraction::InfoExtractor;
//! use paperforge::roles::RoleAssignments;
//! use paperforge::{BackendRegistry, CollaborationEngine, PaperGenerator, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     paperforge::init_logger();
//!
//!     let config = PaperForgeConfig::from_env();
//!     let registry = Arc::new(BackendRegistry::from_env().await);
//!     let assignments = RoleAssignments::compute(&registry);
//!
//!     let store = Arc::new(SessionStore::open(&config.session_dir)?);
//!     let engine = Arc::new(CollaborationEngine::new(registry.clone(), assignments));
//!     let extractor = InfoExtractor::new(registry.clone());
//!     let generator = PaperGenerator::new(store, engine, extractor, config);
//!
//!     let started = generator.start_new_paper("demo_user", "My first paper")?;
//!     let reply = generator
//!         .process_user_input(&started.session_id, "I study urban heat islands.")
//!         .await?;
//!     println!("[{}] {}", reply.stage, reply.message);
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Lightweight on purpose: applications embedding PaperForge can opt in to
/// `RUST_LOG` driven diagnostics without committing to a logging backend.
///
/// ```rust
/// paperforge::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `paperforge` module.
pub mod paperforge;

// Re-exporting key items for easier external access.
pub use crate::paperforge::api;
pub use crate::paperforge::backend;
pub use crate::paperforge::backend::{BackendError, ChatBackend, ChatMessage, ChatRole};
pub use crate::paperforge::backends;
pub use crate::paperforge::completeness;
pub use crate::paperforge::config;
pub use crate::paperforge::engine;
pub use crate::paperforge::extraction;
pub use crate::paperforge::generator;
pub use crate::paperforge::prompts;
pub use crate::paperforge::registry;
pub use crate::paperforge::roles;
pub use crate::paperforge::session;
pub use crate::paperforge::{BackendRegistry, CollaborationEngine, PaperGenerator, SessionStore};
