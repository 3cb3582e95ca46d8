use async_trait::async_trait;
use paperforge::backend::{BackendError, ChatBackend, ChatMessage};
use paperforge::completeness::REQUIRED_FIELDS;
use paperforge::config::PaperForgeConfig;
use paperforge::engine::{CollaborationEngine, GenerationStatus};
use paperforge::extraction::{InfoExtractor, FIELD_SUPPLEMENTARY};
use paperforge::generator::{
    export_as_markdown, export_as_text, ExportFormat, PaperGenerator, Section, Stage,
    TurnStatus, COLLECTING_MISSING,
};
use paperforge::registry::BackendRegistry;
use paperforge::roles::RoleAssignments;
use paperforge::session::{SessionError, SessionStatus, SessionStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Always answers with the same text, like a model that echoes "ok".
struct FixedBackend {
    reply: String,
}

#[async_trait]
impl ChatBackend for FixedBackend {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, BackendError> {
        Ok(self.reply.clone())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

fn setup(
    config: PaperForgeConfig,
    reply: &str,
) -> (TempDir, PaperGenerator, Arc<SessionStore>) {
    let dir = TempDir::new().unwrap();
    let mut config = config;
    config.session_dir = dir.path().to_path_buf();

    let mut registry = BackendRegistry::new();
    registry.register(
        "mock",
        Arc::new(FixedBackend {
            reply: reply.to_string(),
        }),
    );
    let registry = Arc::new(registry);
    let assignments = RoleAssignments::compute(&registry);

    let store = Arc::new(SessionStore::open(&config.session_dir).unwrap());
    let engine = Arc::new(CollaborationEngine::new(registry.clone(), assignments));
    let extractor = InfoExtractor::new(registry);
    let generator = PaperGenerator::new(store.clone(), engine, extractor, config);
    (dir, generator, store)
}

fn stage_index(stage: &str) -> usize {
    Stage::FLOW
        .iter()
        .position(|s| s.as_str() == stage)
        .expect("stage must be in the flow")
}

#[tokio::test]
async fn collection_flow_advances_stages_then_asks_for_gaps() {
    let (_dir, generator, store) = setup(PaperForgeConfig::default(), "ok");

    let started = generator.start_new_paper("alice", "study").unwrap();
    assert_eq!(started.stage, "initial");
    assert_eq!(started.round, Some(1));
    assert_eq!(started.status, TurnStatus::Collecting);
    assert_eq!(store.messages(&started.session_id, None).unwrap().len(), 2);

    // Turns 1..=4 stay under min_rounds and walk the stage flow in order.
    let mut last_index = 0;
    for turn in 1..=4usize {
        let response = generator
            .process_user_input(&started.session_id, "some detail")
            .await
            .unwrap();
        assert_eq!(response.status, TurnStatus::Collecting);
        assert_eq!(response.round, Some(turn + 1));
        assert_eq!(response.stage, Stage::FLOW[turn].as_str());
        assert_eq!(response.message, "ok");

        let index = stage_index(&response.stage);
        assert!(index >= last_index, "stage index must never regress");
        last_index = index;
    }

    // Turn 5 reaches min_rounds; nothing required was filled (the echo
    // reply carries no JSON), so the controller asks for the gaps.
    let response = generator
        .process_user_input(&started.session_id, "more detail")
        .await
        .unwrap();
    assert_eq!(response.stage, COLLECTING_MISSING);
    assert_eq!(response.round, Some(6));
    assert_eq!(response.status, TurnStatus::Collecting);
    let missing = response.missing_info.unwrap();
    assert_eq!(missing, REQUIRED_FIELDS.to_vec());

    // Extraction fell back on every turn; the catch-all field accumulated.
    let context = store.get_context(&started.session_id).unwrap();
    assert_eq!(
        context.collected_info.get(FIELD_SUPPLEMENTARY).and_then(|v| v.as_str()),
        Some("more detail")
    );
}

#[tokio::test]
async fn round_ceiling_forces_generation_with_nothing_collected() {
    let config = PaperForgeConfig {
        min_rounds: 0,
        max_rounds: 1,
        ..PaperForgeConfig::default()
    };
    let (_dir, generator, store) = setup(config, "ok");

    let started = generator.start_new_paper("alice", "study").unwrap();
    let response = generator
        .process_user_input(&started.session_id, "anything at all")
        .await
        .unwrap();

    assert_eq!(response.stage, "completed");
    assert_eq!(response.status, TurnStatus::Completed);
    let paper = response.paper_content.unwrap();
    assert_eq!(paper.len(), Section::ALL.len());
    for section in Section::ALL.iter() {
        assert_eq!(paper.get(section.as_str()).map(String::as_str), Some("ok"));
    }

    let session = store.get(&started.session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.context.current_stage, Stage::Completed);
    // Every section left its iteration trace behind.
    assert!(session
        .context
        .extra
        .contains_key("abstract_generation_process"));
    assert!(session
        .context
        .extra
        .contains_key("conclusion_generation_process"));
}

#[tokio::test]
async fn complete_information_triggers_generation_at_min_rounds() {
    let all_fields = r#"{"research topic": "t", "research background": "b",
        "research objective": "o", "research method": "m",
        "data source": "d", "research findings": "f"}"#;
    let config = PaperForgeConfig {
        min_rounds: 1,
        ..PaperForgeConfig::default()
    };
    let (_dir, generator, store) = setup(config, all_fields);

    let started = generator.start_new_paper("alice", "study").unwrap();
    let response = generator
        .process_user_input(&started.session_id, "here is everything")
        .await
        .unwrap();

    assert_eq!(response.stage, "completed");
    assert_eq!(response.status, TurnStatus::Completed);

    let context = store.get_context(&started.session_id).unwrap();
    for field in REQUIRED_FIELDS.iter() {
        assert!(context.collected_info.contains_key(*field));
    }
}

/// Pops one scripted reply per backend call, echoing once exhausted.
struct ScriptedBackend {
    script: std::sync::Mutex<std::collections::VecDeque<String>>,
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, BackendError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string()))
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn required_field_survives_later_fallback_turns() {
    let dir = TempDir::new().unwrap();
    let config = PaperForgeConfig {
        session_dir: dir.path().to_path_buf(),
        ..PaperForgeConfig::default()
    };

    // Turn 1: extraction finds a required field. Turn 2: extraction falls
    // back to the catch-all. The field from turn 1 must survive the merge.
    let script = vec![
        r#"{"research topic": "urban heat"}"#.to_string(),
        "next question please".to_string(),
        "nothing structured here".to_string(),
    ];
    let mut registry = BackendRegistry::new();
    registry.register(
        "mock",
        Arc::new(ScriptedBackend {
            script: std::sync::Mutex::new(script.into_iter().collect()),
        }),
    );
    let registry = Arc::new(registry);
    let assignments = RoleAssignments::compute(&registry);
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let engine = Arc::new(CollaborationEngine::new(registry.clone(), assignments));
    let generator = PaperGenerator::new(
        store.clone(),
        engine,
        InfoExtractor::new(registry),
        config,
    );

    let started = generator.start_new_paper("alice", "study").unwrap();
    generator
        .process_user_input(&started.session_id, "I study urban heat.")
        .await
        .unwrap();
    generator
        .process_user_input(&started.session_id, "free-form aside")
        .await
        .unwrap();

    let context = store.get_context(&started.session_id).unwrap();
    assert_eq!(
        context.collected_info.get("research topic").and_then(|v| v.as_str()),
        Some("urban heat"),
        "merging later turns must never delete an established field"
    );
    assert_eq!(
        context.collected_info.get(FIELD_SUPPLEMENTARY).and_then(|v| v.as_str()),
        Some("free-form aside")
    );
}

#[tokio::test]
async fn unknown_session_is_an_explicit_not_found() {
    let (_dir, generator, _store) = setup(PaperForgeConfig::default(), "ok");
    let err = generator
        .process_user_input("alice_missing", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));

    let err = generator
        .regenerate_section("alice_missing", Section::Abstract, "")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn regenerate_touches_exactly_one_section() {
    let config = PaperForgeConfig {
        min_rounds: 0,
        max_rounds: 1,
        ..PaperForgeConfig::default()
    };
    let (_dir, generator, store) = setup(config, "ok");

    let started = generator.start_new_paper("alice", "study").unwrap();
    generator
        .process_user_input(&started.session_id, "go")
        .await
        .unwrap();

    // Hand-edit the stored paper so the regenerated section is detectable.
    let mut paper = generator.get_paper_content(&started.session_id).unwrap();
    paper.insert("introduction".to_string(), "hand edited".to_string());
    let mut updates = serde_json::Map::new();
    updates.insert(
        "paper_content".to_string(),
        serde_json::to_value(&paper).unwrap(),
    );
    store.update_context(&started.session_id, updates).unwrap();

    let response = generator
        .regenerate_section(&started.session_id, Section::Abstract, "shorter please")
        .await
        .unwrap();
    assert_eq!(response.section, "abstract");
    assert_eq!(response.content, "ok");
    assert_eq!(response.status, GenerationStatus::Success);

    let paper = generator.get_paper_content(&started.session_id).unwrap();
    assert_eq!(paper.get("abstract").map(String::as_str), Some("ok"));
    assert_eq!(
        paper.get("introduction").map(String::as_str),
        Some("hand edited"),
        "other sections must be untouched"
    );
}

#[test]
fn export_skips_absent_sections_and_is_idempotent() {
    let mut paper = BTreeMap::new();
    paper.insert("abstract".to_string(), "the abstract".to_string());
    paper.insert("conclusion".to_string(), "the conclusion".to_string());

    let first = export_as_markdown(&paper);
    let second = export_as_markdown(&paper);
    assert_eq!(first, second, "same input must export byte-identically");

    assert!(first.contains("## Abstract"));
    assert!(first.contains("## Conclusion"));
    assert!(!first.contains("## Results"));
    // Abstract renders before conclusion regardless of map order.
    assert!(first.find("## Abstract").unwrap() < first.find("## Conclusion").unwrap());

    let text = export_as_text(&paper);
    assert_eq!(text, export_as_text(&paper));
    assert!(text.contains("Academic Paper"));
    assert!(text.contains("the conclusion"));
}

#[tokio::test]
async fn export_renders_generated_paper_in_both_formats() {
    let config = PaperForgeConfig {
        min_rounds: 0,
        max_rounds: 1,
        ..PaperForgeConfig::default()
    };
    let (_dir, generator, _store) = setup(config, "ok");

    let started = generator.start_new_paper("alice", "study").unwrap();
    generator
        .process_user_input(&started.session_id, "go")
        .await
        .unwrap();

    let markdown = generator
        .export_paper(&started.session_id, ExportFormat::Markdown)
        .unwrap();
    assert!(markdown.starts_with("# Academic Paper"));
    for section in Section::ALL.iter() {
        assert!(markdown.contains(&format!("## {}", section.title())));
    }

    let text = generator
        .export_paper(&started.session_id, ExportFormat::Text)
        .unwrap();
    assert!(text.contains("Methodology\n"));
    assert!(!text.contains("##"));
}
