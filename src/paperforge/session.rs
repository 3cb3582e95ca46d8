//! Session records and their file-backed store.
//!
//! A session is the unit of one paper project: the append-only chat
//! transcript (replayed verbatim to backends), the accumulated context
//! (collected fields, current stage, generated sections, iteration traces),
//! and a lifecycle status. Each session persists as one pretty-printed JSON
//! file under the storage directory with last-write-wins semantics, plus an
//! in-memory cache of everything loaded so far.
//!
//! Readers must tolerate context keys they do not know about; anything the
//! struct does not model explicitly lands in `context.extra`.

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::paperforge::backend::{ChatMessage, ChatRole};
use crate::paperforge::generator::Stage;

/// One transcript entry. Order is immutable once appended.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl StoredMessage {
    /// Project to the wire shape backends accept.
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// Session lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

/// Recognized context keys plus a tolerant catch-all.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Accumulating field mapping extracted from user turns. Only ever
    /// gains keys or overwrites values within one session lifetime.
    #[serde(default)]
    pub collected_info: Map<String, Value>,
    #[serde(default)]
    pub current_stage: Stage,
    #[serde(default)]
    pub missing_info: Vec<String>,
    /// Section name to generated text; populated once generation starts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paper_content: BTreeMap<String, String>,
    /// Unmodeled keys (per-section generation traces and anything a newer
    /// writer may add).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionContext {
    /// Top-level shallow merge: each supplied key replaces the value under
    /// that key, nothing else is touched.
    pub fn apply_updates(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            match key.as_str() {
                "collected_info" => {
                    if let Value::Object(fields) = value {
                        self.collected_info = fields;
                    }
                }
                "current_stage" => {
                    match serde_json::from_value::<Stage>(value.clone()) {
                        Ok(stage) => self.current_stage = stage,
                        Err(_) => warn!("ignoring unknown stage value: {}", value),
                    }
                }
                "missing_info" => {
                    if let Ok(missing) = serde_json::from_value::<Vec<String>>(value) {
                        self.missing_info = missing;
                    }
                }
                "paper_content" => {
                    if let Ok(content) = serde_json::from_value::<BTreeMap<String, String>>(value) {
                        self.paper_content = content;
                    }
                }
                _ => {
                    self.extra.insert(key, value);
                }
            }
        }
    }
}

/// A full session record, serialized as one JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    #[serde(default)]
    pub context: SessionContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
}

/// Errors from session-store operations.
#[derive(Debug)]
pub enum SessionError {
    /// The addressed session does not exist (or was deleted).
    NotFound(String),
    /// Reading or writing the backing file failed.
    Storage(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound(id) => write!(f, "session not found: {}", id),
            SessionError::Storage(msg) => write!(f, "session storage error: {}", msg),
        }
    }
}

impl Error for SessionError {}

/// File-backed keyed store of sessions.
pub struct SessionStore {
    storage_dir: PathBuf,
    cache: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    /// Open (and create if needed) a store rooted at `storage_dir`.
    pub fn open(storage_dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)
            .map_err(|err| SessionError::Storage(format!("cannot create {:?}: {}", storage_dir, err)))?;
        Ok(SessionStore {
            storage_dir,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", session_id))
    }

    /// Create and persist a fresh active session.
    pub fn create(&self, user_id: &str, title: &str) -> Result<Session, SessionError> {
        let now = Utc::now();
        let session = Session {
            session_id: format!("{}_{}", user_id, Uuid::new_v4()),
            user_id: user_id.to_string(),
            title: title.to_string(),
            messages: Vec::new(),
            context: SessionContext::default(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
        };

        save_session(&self.session_path(&session.session_id), &session)?;
        self.cache
            .lock()
            .unwrap()
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    /// Fetch a session by id, from cache or disk.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(session) = cache.get(session_id) {
            return Some(session.clone());
        }
        let session = load_session(&self.session_path(session_id))?;
        cache.insert(session_id.to_string(), session.clone());
        Some(session)
    }

    /// Run a mutation against the session, bump `updated_at`, persist.
    fn with_session_mut<T>(
        &self,
        session_id: &str,
        mutate: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, SessionError> {
        let mut cache = self.cache.lock().unwrap();
        if !cache.contains_key(session_id) {
            let loaded = load_session(&self.session_path(session_id))
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            cache.insert(session_id.to_string(), loaded);
        }
        let session = cache.get_mut(session_id).unwrap();
        let out = mutate(session);
        session.updated_at = Utc::now();
        save_session(&self.session_path(session_id), session)?;
        Ok(out)
    }

    /// Append one message to the transcript.
    pub fn append_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<StoredMessage, SessionError> {
        let message = StoredMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata: metadata.unwrap_or_default(),
        };
        self.with_session_mut(session_id, |session| {
            session.messages.push(message.clone());
        })?;
        Ok(message)
    }

    /// The transcript, optionally limited to the most recent `limit` entries.
    pub fn messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, SessionError> {
        let session = self
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let messages = match limit {
            Some(limit) if limit < session.messages.len() => {
                session.messages[session.messages.len() - limit..].to_vec()
            }
            _ => session.messages,
        };
        Ok(messages)
    }

    /// The transcript in wire shape, for replaying to a backend.
    pub fn messages_for_backend(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, SessionError> {
        Ok(self
            .messages(session_id, limit)?
            .iter()
            .map(StoredMessage::to_chat_message)
            .collect())
    }

    /// Merge `updates` into the session context (top-level keys replace).
    pub fn update_context(
        &self,
        session_id: &str,
        updates: Map<String, Value>,
    ) -> Result<(), SessionError> {
        self.with_session_mut(session_id, |session| {
            session.context.apply_updates(updates);
        })
    }

    pub fn get_context(&self, session_id: &str) -> Result<SessionContext, SessionError> {
        self.get(session_id)
            .map(|session| session.context)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn set_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), SessionError> {
        self.with_session_mut(session_id, |session| {
            session.status = status;
        })
    }

    /// Every stored session, most recently updated first, optionally
    /// filtered by owner. Unreadable files are skipped with a warning.
    pub fn list(&self, user_id: Option<&str>) -> Vec<Session> {
        let mut sessions = Vec::new();
        let entries = match fs::read_dir(&self.storage_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("cannot list sessions in {:?}: {}", self.storage_dir, err);
                return sessions;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(session) = load_session(&path) {
                if user_id.map(|uid| session.user_id == uid).unwrap_or(true) {
                    sessions.push(session);
                }
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Remove a session from cache and disk.
    pub fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let existed_in_cache = self.cache.lock().unwrap().remove(session_id).is_some();
        let path = self.session_path(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if existed_in_cache {
                    Ok(())
                } else {
                    Err(SessionError::NotFound(session_id.to_string()))
                }
            }
            Err(err) => Err(SessionError::Storage(format!(
                "cannot delete {:?}: {}",
                path, err
            ))),
        }
    }

    /// Age-based sweep: drop sessions inactive for more than `days` days,
    /// unless they are still active. Returns how many were removed.
    pub fn clear_old_sessions(&self, days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(days);
        let mut removed = 0;
        for session in self.list(None) {
            if session.updated_at < cutoff && session.status != SessionStatus::Active {
                if self.delete(&session.session_id).is_ok() {
                    removed += 1;
                }
            }
        }
        removed
    }
}

fn save_session(path: &Path, session: &Session) -> Result<(), SessionError> {
    let body = serde_json::to_string_pretty(session)
        .map_err(|err| SessionError::Storage(format!("cannot serialize session: {}", err)))?;
    fs::write(path, body)
        .map_err(|err| SessionError::Storage(format!("cannot write {:?}: {}", path, err)))
}

fn load_session(path: &Path) -> Option<Session> {
    let body = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&body) {
        Ok(session) => Some(session),
        Err(err) => {
            warn!("skipping unreadable session file {:?}: {}", path, err);
            None
        }
    }
}
