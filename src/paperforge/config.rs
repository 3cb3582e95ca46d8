//! Configuration for PaperForge.
//!
//! A deliberately small, manually constructed struct; no config-file
//! parsing dependencies. Every knob can be overridden from the environment
//! via [`PaperForgeConfig::from_env`], which is how the server binary
//! builds it. Backend connection settings live with the registry (see
//! [`BackendRegistry::from_env`](crate::paperforge::registry::BackendRegistry::from_env)),
//! not here.

use std::path::PathBuf;

/// Tunables for the interview flow, the generation loop, and storage.
#[derive(Clone, Debug)]
pub struct PaperForgeConfig {
    /// Interview rounds to run before completeness is even checked.
    pub min_rounds: usize,
    /// Hard ceiling: at this round generation starts no matter what.
    pub max_rounds: usize,
    /// Refinement iterations per section in the generation loop.
    pub iterations: usize,
    /// Directory holding one JSON file per session.
    pub session_dir: PathBuf,
}

impl Default for PaperForgeConfig {
    fn default() -> Self {
        PaperForgeConfig {
            min_rounds: 5,
            max_rounds: 15,
            iterations: 1,
            session_dir: PathBuf::from("data/sessions"),
        }
    }
}

impl PaperForgeConfig {
    /// Defaults overridden by `PAPER_MIN_ROUNDS`, `PAPER_MAX_ROUNDS`,
    /// `PAPER_ITERATIONS`, and `PAPER_SESSION_DIR`. Unparsable values fall
    /// back to the default silently; configuration problems must not keep
    /// the service from starting.
    pub fn from_env() -> Self {
        let defaults = PaperForgeConfig::default();
        PaperForgeConfig {
            min_rounds: env_usize("PAPER_MIN_ROUNDS").unwrap_or(defaults.min_rounds),
            max_rounds: env_usize("PAPER_MAX_ROUNDS").unwrap_or(defaults.max_rounds),
            iterations: env_usize("PAPER_ITERATIONS").unwrap_or(defaults.iterations),
            session_dir: std::env::var("PAPER_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_dir),
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
