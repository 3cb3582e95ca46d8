//! HTTP surface for the paper service.
//!
//! Thin axum wrappers over the core: every handler answers a JSON envelope
//! of `{"success": ..., "data" | "error": ...}`, unknown sessions map to
//! 404, and nothing here contains paper logic. Turns on the *same* session
//! are serialized through a per-session async mutex, because concurrent
//! writes to one session record are last-write-wins; different sessions
//! proceed independently.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::paperforge::generator::{ExportFormat, PaperGenerator, Section, Stage};
use crate::paperforge::registry::BackendRegistry;
use crate::paperforge::roles::Role;
use crate::paperforge::session::{SessionError, SessionStore};

/// Shared state handed to every handler.
pub struct AppState {
    pub generator: PaperGenerator,
    pub store: Arc<SessionStore>,
    pub registry: Arc<BackendRegistry>,
    /// One lock per session id; taken for the duration of a turn.
    turn_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    pub fn new(
        generator: PaperGenerator,
        store: Arc<SessionStore>,
        registry: Arc<BackendRegistry>,
    ) -> Self {
        AppState {
            generator,
            store,
            registry,
            turn_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/services", get(services))
        .route("/api/paper/start", post(start_paper))
        .route("/api/paper/message", post(send_message))
        .route("/api/paper/generate", post(generate_paper))
        .route("/api/paper/regenerate", post(regenerate_section))
        .route(
            "/api/paper/session/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/paper/sessions", get(list_sessions))
        .route("/api/paper/messages/{session_id}", get(get_messages))
        .route("/api/paper/content/{session_id}", get(get_content))
        .route("/api/paper/export/{session_id}", get(export_paper))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

fn fail_session(err: SessionError) -> Response {
    match err {
        SessionError::NotFound(_) => fail(StatusCode::NOT_FOUND, err.to_string()),
        SessionError::Storage(_) => fail(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let services = state.registry.names().to_vec();
    ok(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "ai_services": services,
        "ai_services_count": state.registry.len(),
    }))
}

async fn services(State(state): State<Arc<AppState>>) -> Response {
    let role_info: Map<String, Value> = Role::ALL
        .iter()
        .map(|role| {
            let config = role.config();
            (
                role.key().to_string(),
                json!({
                    "description": config.description,
                    "temperature": config.temperature,
                    "max_tokens": config.max_tokens,
                }),
            )
        })
        .collect();

    ok(json!({
        "services": state.registry.names(),
        "role_mapping": state.generator.assignments().as_map(),
        "role_info": role_info,
    }))
}

#[derive(Deserialize)]
struct StartRequest {
    #[serde(default = "default_user")]
    user_id: String,
    #[serde(default = "default_title")]
    title: String,
    /// Pre-collected fields from a form front end, if any.
    #[serde(default)]
    collected_info: Map<String, Value>,
    /// Skip the interview and jump straight to a generating-ready session.
    #[serde(default)]
    skip_conversation: bool,
}

fn default_user() -> String {
    "default_user".to_string()
}

fn default_title() -> String {
    "New paper project".to_string()
}

async fn start_paper(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Response {
    if request.skip_conversation {
        let session = match state.store.create(&request.user_id, &request.title) {
            Ok(session) => session,
            Err(err) => return fail_session(err),
        };
        let mut updates = Map::new();
        updates.insert(
            "collected_info".to_string(),
            Value::Object(request.collected_info),
        );
        updates.insert(
            "current_stage".to_string(),
            serde_json::to_value(Stage::Generating).unwrap_or(Value::Null),
        );
        if let Err(err) = state.store.update_context(&session.session_id, updates) {
            return fail_session(err);
        }
        return ok(json!({
            "session_id": session.session_id,
            "stage": Stage::Generating.as_str(),
            "message": "Project created; paper generation can start right away.",
        }));
    }

    let response = match state
        .generator
        .start_new_paper(&request.user_id, &request.title)
    {
        Ok(response) => response,
        Err(err) => return fail_session(err),
    };

    if !request.collected_info.is_empty() {
        let mut updates = Map::new();
        updates.insert(
            "collected_info".to_string(),
            Value::Object(request.collected_info),
        );
        if let Err(err) = state.store.update_context(&response.session_id, updates) {
            return fail_session(err);
        }
    }

    ok(serde_json::to_value(&response).unwrap_or(Value::Null))
}

#[derive(Deserialize)]
struct MessageRequest {
    session_id: String,
    message: String,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Response {
    if request.session_id.is_empty() || request.message.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "session_id and message are required");
    }

    let lock = state.turn_lock(&request.session_id).await;
    let _turn = lock.lock().await;

    match state
        .generator
        .process_user_input(&request.session_id, &request.message)
        .await
    {
        Ok(response) => ok(serde_json::to_value(&response).unwrap_or(Value::Null)),
        Err(err) => fail_session(err),
    }
}

#[derive(Deserialize)]
struct GenerateRequest {
    session_id: String,
}

async fn generate_paper(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let lock = state.turn_lock(&request.session_id).await;
    let _turn = lock.lock().await;

    match state.generator.generate_immediately(&request.session_id).await {
        Ok(paper_content) => ok(json!({
            "session_id": request.session_id,
            "paper_content": paper_content,
        })),
        Err(err) => fail_session(err),
    }
}

#[derive(Deserialize)]
struct RegenerateRequest {
    session_id: String,
    section: String,
    #[serde(default)]
    requirements: String,
}

async fn regenerate_section(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegenerateRequest>,
) -> Response {
    let section = match Section::parse(&request.section) {
        Some(section) => section,
        None => {
            return fail(
                StatusCode::BAD_REQUEST,
                format!("unknown section: {}", request.section),
            )
        }
    };

    let lock = state.turn_lock(&request.session_id).await;
    let _turn = lock.lock().await;

    match state
        .generator
        .regenerate_section(&request.session_id, section, &request.requirements)
        .await
    {
        Ok(response) => ok(serde_json::to_value(&response).unwrap_or(Value::Null)),
        Err(err) => fail_session(err),
    }
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.get(&session_id) {
        Some(session) => {
            let paper_content = session.context.paper_content.clone();
            ok(json!({
                "session": session,
                "paper_content": paper_content,
            }))
        }
        None => fail(StatusCode::NOT_FOUND, format!("session not found: {}", session_id)),
    }
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.delete(&session_id) {
        Ok(()) => ok(json!({ "message": "session deleted" })),
        Err(err) => fail_session(err),
    }
}

#[derive(Deserialize)]
struct ListQuery {
    user_id: Option<String>,
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let sessions: Vec<Value> = state
        .store
        .list(query.user_id.as_deref())
        .into_iter()
        .map(|session| {
            json!({
                "session_id": session.session_id,
                "user_id": session.user_id,
                "title": session.title,
                "status": session.status,
                "created_at": session.created_at,
                "updated_at": session.updated_at,
                "message_count": session.messages.len(),
                "stage": session.context.current_stage,
            })
        })
        .collect();
    ok(Value::Array(sessions))
}

async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.messages(&session_id, None) {
        Ok(messages) => ok(serde_json::to_value(&messages).unwrap_or(Value::Null)),
        Err(err) => fail_session(err),
    }
}

async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.generator.get_paper_content(&session_id) {
        Ok(content) if !content.is_empty() => {
            ok(serde_json::to_value(&content).unwrap_or(Value::Null))
        }
        Ok(_) => fail(StatusCode::NOT_FOUND, "no paper content yet"),
        Err(err) => fail_session(err),
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: Option<String>,
}

async fn export_paper(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response {
    match state.generator.get_paper_content(&session_id) {
        Ok(paper) if paper.is_empty() => fail(StatusCode::NOT_FOUND, "no paper content yet"),
        Ok(_) => {
            let format = ExportFormat::parse(query.format.as_deref().unwrap_or("markdown"));
            let content = match state.generator.export_paper(&session_id, format) {
                Ok(content) => content,
                Err(err) => return fail_session(err),
            };
            let content_type = match format {
                ExportFormat::Markdown => "text/markdown; charset=utf-8",
                ExportFormat::Text => "text/plain; charset=utf-8",
            };
            ([(header::CONTENT_TYPE, content_type)], content).into_response()
        }
        Err(err) => fail_session(err),
    }
}
