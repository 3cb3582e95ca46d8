use async_trait::async_trait;
use paperforge::backend::{BackendError, ChatBackend, ChatMessage};
use paperforge::engine::{CollaborationEngine, GenerationStatus, IterationKind};
use paperforge::generator::{Section, Stage};
use paperforge::registry::BackendRegistry;
use paperforge::roles::RoleAssignments;
use serde_json::Map;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays a fixed script of replies; an exhausted script keeps echoing.
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<&str, &str>>) -> Self {
        ScriptedBackend {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|step| step.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        }
    }

    fn echo() -> Self {
        ScriptedBackend::new(Vec::new())
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, BackendError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(BackendError::Transport(message)),
            None => Ok("ok".to_string()),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}

fn engine_with(backend: ScriptedBackend) -> CollaborationEngine {
    let mut registry = BackendRegistry::new();
    registry.register("mock", Arc::new(backend));
    let registry = Arc::new(registry);
    let assignments = RoleAssignments::compute(&registry);
    CollaborationEngine::new(registry, assignments)
}

#[tokio::test]
async fn single_iteration_produces_full_trace() {
    let engine = engine_with(ScriptedBackend::new(vec![
        Ok("draft"),
        Ok("review notes"),
        Ok("structure notes"),
        Ok("improved draft"),
    ]));

    let outcome = engine
        .collaborative_generation(Section::Abstract, &Map::new(), 1, "")
        .await;

    assert_eq!(outcome.status, GenerationStatus::Success);
    assert_eq!(outcome.final_content, "improved draft");
    let kinds: Vec<IterationKind> = outcome.iterations.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            IterationKind::InitialGeneration,
            IterationKind::QualityReview,
            IterationKind::StructureOptimization,
            IterationKind::ImprovedGeneration,
        ]
    );
    assert_eq!(outcome.iterations[0].iteration, 0);
    assert_eq!(outcome.iterations[3].iteration, 1);
}

#[tokio::test]
async fn failure_mid_loop_preserves_partial_progress() {
    // Three iterations requested; the backend dies on iteration 2's review.
    let engine = engine_with(ScriptedBackend::new(vec![
        Ok("draft"),
        Ok("review 1"),
        Ok("optimize 1"),
        Ok("improved 1"),
        Err("connection reset"),
    ]));

    let outcome = engine
        .collaborative_generation(Section::Results, &Map::new(), 3, "")
        .await;

    assert_eq!(outcome.status, GenerationStatus::Error);
    assert_eq!(outcome.final_content, "improved 1");
    assert_eq!(outcome.iterations.len(), 4);
    assert!(outcome.error.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn failure_on_first_generation_returns_empty_content() {
    let engine = engine_with(ScriptedBackend::new(vec![Err("boom")]));

    let outcome = engine
        .collaborative_generation(Section::Introduction, &Map::new(), 2, "")
        .await;

    assert_eq!(outcome.status, GenerationStatus::Error);
    assert_eq!(outcome.final_content, "");
    assert!(outcome.iterations.is_empty());
}

#[tokio::test]
async fn zero_iterations_stops_after_initial_generation() {
    let engine = engine_with(ScriptedBackend::new(vec![Ok("only draft")]));

    let outcome = engine
        .collaborative_generation(Section::Conclusion, &Map::new(), 0, "")
        .await;

    assert_eq!(outcome.status, GenerationStatus::Success);
    assert_eq!(outcome.final_content, "only draft");
    assert_eq!(outcome.iterations.len(), 1);
}

#[tokio::test]
async fn collector_degrades_without_backends() {
    let registry = Arc::new(BackendRegistry::new());
    let assignments = RoleAssignments::compute(&registry);
    let engine = CollaborationEngine::new(registry, assignments);

    let reply = engine
        .collect_information(Stage::Initial, &Map::new(), &[])
        .await;
    assert!(reply.contains("could not reach"));
}

#[tokio::test]
async fn collector_returns_backend_reply() {
    let engine = engine_with(ScriptedBackend::echo());
    let history = vec![
        ChatMessage::user("earlier question"),
        ChatMessage::assistant("earlier answer"),
    ];
    let reply = engine
        .collect_information(Stage::Methodology, &Map::new(), &history)
        .await;
    assert_eq!(reply, "ok");
}
