use paperforge::backend::ChatRole;
use paperforge::generator::Stage;
use paperforge::session::{SessionError, SessionStatus, SessionStore};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

fn store() -> (TempDir, SessionStore) {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    (dir, store)
}

#[test]
fn create_then_get_roundtrip() {
    let (_dir, store) = store();
    let session = store.create("alice", "Heat island study").unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.session_id.starts_with("alice_"));
    assert!(session.updated_at >= session.created_at);

    let loaded = store.get(&session.session_id).unwrap();
    assert_eq!(loaded.title, "Heat island study");
    assert_eq!(loaded.context.current_stage, Stage::Initial);
    assert!(loaded.messages.is_empty());
}

#[test]
fn appended_messages_keep_order() {
    let (_dir, store) = store();
    let session = store.create("alice", "t").unwrap();
    store
        .append_message(&session.session_id, ChatRole::System, "sys", None)
        .unwrap();
    store
        .append_message(&session.session_id, ChatRole::User, "first", None)
        .unwrap();
    store
        .append_message(&session.session_id, ChatRole::Assistant, "second", None)
        .unwrap();

    let messages = store.messages(&session.session_id, None).unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["sys", "first", "second"]);

    let tail = store.messages(&session.session_id, Some(2)).unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].content, "first");
}

#[test]
fn update_context_merges_and_survives_reload() {
    let (dir, store) = store();
    let session = store.create("alice", "t").unwrap();

    let mut updates = Map::new();
    updates.insert(
        "collected_info".to_string(),
        json!({ "research topic": "heat islands" }),
    );
    updates.insert("current_stage".to_string(), json!("methodology"));
    updates.insert("custom_note".to_string(), json!("kept verbatim"));
    store.update_context(&session.session_id, updates).unwrap();

    // A second update must merge at the top level, not replace the context.
    let mut more = Map::new();
    more.insert("abstract_generation_process".to_string(), json!([{"iteration": 0}]));
    store.update_context(&session.session_id, more).unwrap();

    // Fresh store instance forces a disk read.
    let reopened = SessionStore::open(dir.path()).unwrap();
    let context = reopened.get_context(&session.session_id).unwrap();
    assert_eq!(context.current_stage, Stage::Methodology);
    assert_eq!(
        context.collected_info.get("research topic").and_then(Value::as_str),
        Some("heat islands")
    );
    assert_eq!(
        context.extra.get("custom_note").and_then(Value::as_str),
        Some("kept verbatim")
    );
    assert!(context.extra.contains_key("abstract_generation_process"));
}

#[test]
fn unknown_context_keys_in_stored_files_are_tolerated() {
    let (dir, store) = store();
    let session = store.create("alice", "t").unwrap();

    // Simulate a newer writer adding a key this reader does not model.
    let path = dir.path().join(format!("{}.json", session.session_id));
    let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    raw["context"]["future_feature"] = json!({"enabled": true});
    std::fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();

    let reopened = SessionStore::open(dir.path()).unwrap();
    let context = reopened.get_context(&session.session_id).unwrap();
    assert!(context.extra.contains_key("future_feature"));
}

#[test]
fn list_orders_by_most_recently_updated() {
    let (_dir, store) = store();
    let first = store.create("alice", "first").unwrap();
    let second = store.create("alice", "second").unwrap();
    let _other = store.create("bob", "other").unwrap();

    // Touch the older session so it becomes the most recent.
    store
        .append_message(&first.session_id, ChatRole::User, "bump", None)
        .unwrap();

    let all = store.list(None);
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].session_id, first.session_id);

    let alices = store.list(Some("alice"));
    assert_eq!(alices.len(), 2);
    assert_eq!(alices[0].session_id, first.session_id);
    assert_eq!(alices[1].session_id, second.session_id);
}

#[test]
fn delete_removes_session_and_reports_unknown_ids() {
    let (_dir, store) = store();
    let session = store.create("alice", "t").unwrap();
    store.delete(&session.session_id).unwrap();
    assert!(store.get(&session.session_id).is_none());

    let err = store.delete("alice_nope").unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[test]
fn mutating_a_missing_session_reports_not_found() {
    let (_dir, store) = store();
    let err = store
        .append_message("ghost", ChatRole::User, "hello", None)
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));

    let err = store.set_status("ghost", SessionStatus::Abandoned).unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[test]
fn sweep_only_removes_old_inactive_sessions() {
    let (_dir, store) = store();
    let active = store.create("alice", "active").unwrap();
    let done = store.create("alice", "done").unwrap();
    store
        .set_status(&done.session_id, SessionStatus::Completed)
        .unwrap();

    // Nothing is older than the cutoff yet.
    assert_eq!(store.clear_old_sessions(30), 0);

    // A zero-day cutoff treats both as old, but the active one survives.
    assert_eq!(store.clear_old_sessions(0), 1);
    assert!(store.get(&active.session_id).is_some());
    assert!(store.get(&done.session_id).is_none());
}
