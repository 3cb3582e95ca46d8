//! PaperForge HTTP server.
//!
//! Wires the process-wide pieces together once at startup (registry from
//! the environment, cached role assignments, file-backed session store)
//! and serves the JSON API. Backend configuration is read only here;
//! changing it requires a restart.

use std::sync::Arc;

use log::info;

use paperforge::api::{self, AppState};
use paperforge::config::PaperForgeConfig;
use paperforge::extraction::InfoExtractor;
use paperforge::roles::RoleAssignments;
use paperforge::{BackendRegistry, CollaborationEngine, PaperGenerator, SessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    paperforge::init_logger();

    let config = PaperForgeConfig::from_env();
    let registry = Arc::new(BackendRegistry::from_env().await);
    let assignments = RoleAssignments::compute(&registry);
    for (role, backend) in assignments.as_map() {
        info!("role {} served by backend {}", role, backend);
    }

    let store = Arc::new(SessionStore::open(&config.session_dir)?);
    let engine = Arc::new(CollaborationEngine::new(registry.clone(), assignments));
    let extractor = InfoExtractor::new(registry.clone());
    let generator = PaperGenerator::new(store.clone(), engine, extractor, config);

    let state = Arc::new(AppState::new(generator, store, registry));
    let app = api::router(state);

    let addr = std::env::var("PAPERFORGE_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
