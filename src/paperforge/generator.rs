//! The conversation-stage state machine and paper assembly.
//!
//! [`PaperGenerator`] owns the full lifecycle of a paper project: it walks
//! the user through the fixed interview stages, merges extracted fields
//! into the session context after every turn, decides when enough has been
//! gathered (or when the round ceiling forces the issue), and then drives
//! the collaborative generation loop once per section to assemble the
//! final document.
//!
//! The controller never raises past its boundary: backend trouble degrades
//! to apologetic messages or error-status partial results, and the only
//! error callers see is an explicit session-not-found (or storage) result.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::paperforge::backend::ChatRole;
use crate::paperforge::completeness::check_completeness;
use crate::paperforge::config::PaperForgeConfig;
use crate::paperforge::engine::{CollaborationEngine, GenerationStatus};
use crate::paperforge::extraction::InfoExtractor;
use crate::paperforge::prompts;
use crate::paperforge::session::{SessionError, SessionStatus, SessionStore};

/// A point in the information-collection state machine.
///
/// The declaration order is the interview order. `LiteratureReview` is
/// deliberately visited after `Discussion` in the collection phase; this
/// ordering is given product policy, not an accident to correct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    ResearchBackground,
    Methodology,
    Results,
    Discussion,
    LiteratureReview,
    Generating,
    Completed,
}

impl Stage {
    /// The stages the controller advances through during collection.
    pub const FLOW: [Stage; 7] = [
        Stage::Initial,
        Stage::ResearchBackground,
        Stage::Methodology,
        Stage::Results,
        Stage::Discussion,
        Stage::LiteratureReview,
        Stage::Generating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::ResearchBackground => "research_background",
            Stage::Methodology => "methodology",
            Stage::Results => "results",
            Stage::Discussion => "discussion",
            Stage::LiteratureReview => "literature_review",
            Stage::Generating => "generating",
            Stage::Completed => "completed",
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Initial
    }
}

/// Synthetic stage label returned while the controller waits for the user
/// to fill specific gaps; never stored as a real stage.
pub const COLLECTING_MISSING: &str = "collecting_missing";

/// One named part of the final paper, in fixed assembly order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Abstract,
    Introduction,
    LiteratureReview,
    Methodology,
    Results,
    Discussion,
    Conclusion,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Abstract,
        Section::Introduction,
        Section::LiteratureReview,
        Section::Methodology,
        Section::Results,
        Section::Discussion,
        Section::Conclusion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Abstract => "abstract",
            Section::Introduction => "introduction",
            Section::LiteratureReview => "literature_review",
            Section::Methodology => "methodology",
            Section::Results => "results",
            Section::Discussion => "discussion",
            Section::Conclusion => "conclusion",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Abstract => "Abstract",
            Section::Introduction => "Introduction",
            Section::LiteratureReview => "Literature Review",
            Section::Methodology => "Methodology",
            Section::Results => "Results",
            Section::Discussion => "Discussion",
            Section::Conclusion => "Conclusion",
        }
    }

    pub fn parse(name: &str) -> Option<Section> {
        Section::ALL
            .iter()
            .copied()
            .find(|section| section.as_str() == name)
    }
}

/// Rendering for exported papers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Text,
}

impl ExportFormat {
    /// Tolerant parse; anything unrecognized exports as markdown.
    pub fn parse(name: &str) -> ExportFormat {
        match name {
            "text" | "txt" | "plain" => ExportFormat::Text,
            _ => ExportFormat::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Collecting,
    Completed,
}

/// Structured response for every turn; the controller's only output shape.
#[derive(Clone, Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    /// Stage name, or the synthetic [`COLLECTING_MISSING`] marker.
    pub stage: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_info: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_content: Option<BTreeMap<String, String>>,
    pub status: TurnStatus,
}

/// Result of an out-of-band single-section regeneration.
#[derive(Clone, Debug, Serialize)]
pub struct RegenerateResponse {
    pub session_id: String,
    pub section: String,
    pub content: String,
    pub status: GenerationStatus,
}

/// The stage controller plus paper assembly.
pub struct PaperGenerator {
    store: Arc<SessionStore>,
    engine: Arc<CollaborationEngine>,
    extractor: InfoExtractor,
    config: PaperForgeConfig,
}

impl PaperGenerator {
    pub fn new(
        store: Arc<SessionStore>,
        engine: Arc<CollaborationEngine>,
        extractor: InfoExtractor,
        config: PaperForgeConfig,
    ) -> Self {
        PaperGenerator {
            store,
            engine,
            extractor,
            config,
        }
    }

    /// Create a session and seed it with the system preamble and the
    /// initial interview guidance.
    pub fn start_new_paper(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<TurnResponse, SessionError> {
        let session = self.store.create(user_id, title)?;
        self.store.append_message(
            &session.session_id,
            ChatRole::System,
            prompts::SYSTEM_ROLE,
            None,
        )?;

        let initial_message =
            prompts::build_information_collection_message(Stage::Initial.as_str(), &Map::new());
        self.store.append_message(
            &session.session_id,
            ChatRole::Assistant,
            &initial_message,
            None,
        )?;

        Ok(TurnResponse {
            session_id: session.session_id,
            stage: Stage::Initial.as_str().to_string(),
            message: initial_message,
            round: Some(1),
            missing_info: None,
            paper_content: None,
            status: TurnStatus::Collecting,
        })
    }

    /// Process one user turn: extract, merge, and either keep collecting,
    /// ask for specific gaps, or generate the whole paper.
    pub async fn process_user_input(
        &self,
        session_id: &str,
        user_input: &str,
    ) -> Result<TurnResponse, SessionError> {
        if self.store.get(session_id).is_none() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        self.store
            .append_message(session_id, ChatRole::User, user_input, None)?;

        let context = self.store.get_context(session_id)?;
        let extracted = self
            .extractor
            .extract(user_input, context.current_stage.as_str())
            .await;

        // Shallow merge; later values win, keys are never removed.
        let mut collected_info = context.collected_info;
        for (key, value) in extracted {
            collected_info.insert(key, value);
        }
        let mut updates = Map::new();
        updates.insert(
            "collected_info".to_string(),
            Value::Object(collected_info.clone()),
        );
        self.store.update_context(session_id, updates)?;

        // One round is a user+assistant exchange.
        let round = self.store.messages(session_id, None)?.len() / 2;

        if round < self.config.min_rounds {
            return self
                .continue_information_collection(session_id, &collected_info, round)
                .await;
        }

        let completeness = check_completeness(&collected_info);
        if completeness.is_complete || round >= self.config.max_rounds {
            self.start_paper_generation(session_id, &collected_info)
                .await
        } else {
            self.collect_missing_information(session_id, completeness.missing_info, round)
        }
    }

    async fn continue_information_collection(
        &self,
        session_id: &str,
        collected_info: &Map<String, Value>,
        round: usize,
    ) -> Result<TurnResponse, SessionError> {
        let stage_index = round.min(Stage::FLOW.len() - 1);
        let next_stage = Stage::FLOW[stage_index];

        let mut updates = Map::new();
        updates.insert(
            "current_stage".to_string(),
            serde_json::to_value(next_stage).unwrap_or(Value::Null),
        );
        self.store.update_context(session_id, updates)?;

        let history = self.store.messages_for_backend(session_id, Some(6))?;
        let reply = self
            .engine
            .collect_information(next_stage, collected_info, &history)
            .await;
        self.store
            .append_message(session_id, ChatRole::Assistant, &reply, None)?;

        Ok(TurnResponse {
            session_id: session_id.to_string(),
            stage: next_stage.as_str().to_string(),
            message: reply,
            round: Some(round + 1),
            missing_info: None,
            paper_content: None,
            status: TurnStatus::Collecting,
        })
    }

    fn collect_missing_information(
        &self,
        session_id: &str,
        missing_info: Vec<String>,
        round: usize,
    ) -> Result<TurnResponse, SessionError> {
        let prompt = prompts::render(
            prompts::MISSING_INFO_PROMPT,
            &[("missing", &missing_info.join(", "))],
        );
        self.store
            .append_message(session_id, ChatRole::Assistant, &prompt, None)?;

        let mut updates = Map::new();
        updates.insert(
            "missing_info".to_string(),
            serde_json::to_value(&missing_info).unwrap_or(Value::Null),
        );
        self.store.update_context(session_id, updates)?;

        Ok(TurnResponse {
            session_id: session_id.to_string(),
            stage: COLLECTING_MISSING.to_string(),
            message: prompt,
            round: Some(round + 1),
            missing_info: Some(missing_info),
            paper_content: None,
            status: TurnStatus::Collecting,
        })
    }

    async fn start_paper_generation(
        &self,
        session_id: &str,
        collected_info: &Map<String, Value>,
    ) -> Result<TurnResponse, SessionError> {
        let mut updates = Map::new();
        updates.insert(
            "current_stage".to_string(),
            serde_json::to_value(Stage::Generating).unwrap_or(Value::Null),
        );
        self.store.update_context(session_id, updates)?;
        self.store.append_message(
            session_id,
            ChatRole::Assistant,
            prompts::GENERATION_NOTICE,
            None,
        )?;

        let paper_content = self.generate_full_paper(session_id, collected_info).await?;

        let mut updates = Map::new();
        updates.insert(
            "paper_content".to_string(),
            serde_json::to_value(&paper_content).unwrap_or(Value::Null),
        );
        updates.insert(
            "current_stage".to_string(),
            serde_json::to_value(Stage::Completed).unwrap_or(Value::Null),
        );
        self.store.update_context(session_id, updates)?;
        self.store.set_status(session_id, SessionStatus::Completed)?;
        self.store.append_message(
            session_id,
            ChatRole::Assistant,
            prompts::COMPLETION_NOTICE,
            None,
        )?;

        Ok(TurnResponse {
            session_id: session_id.to_string(),
            stage: Stage::Completed.as_str().to_string(),
            message: prompts::COMPLETION_NOTICE.to_string(),
            round: None,
            missing_info: None,
            paper_content: Some(paper_content),
            status: TurnStatus::Completed,
        })
    }

    /// Run the generation loop once per section, in fixed order, persisting
    /// each section's iteration trace as it lands.
    async fn generate_full_paper(
        &self,
        session_id: &str,
        collected_info: &Map<String, Value>,
    ) -> Result<BTreeMap<String, String>, SessionError> {
        let mut paper_content = BTreeMap::new();

        for section in Section::ALL.iter() {
            let outcome = self
                .engine
                .collaborative_generation(*section, collected_info, self.config.iterations, "")
                .await;
            if outcome.status == GenerationStatus::Error {
                warn!(
                    "generation of {} degraded: {}",
                    section.as_str(),
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }

            paper_content.insert(section.as_str().to_string(), outcome.final_content.clone());

            let mut updates = Map::new();
            updates.insert(
                format!("{}_generation_process", section.as_str()),
                serde_json::to_value(&outcome.iterations).unwrap_or(Value::Null),
            );
            self.store.update_context(session_id, updates)?;
        }

        Ok(paper_content)
    }

    /// Generate the full paper right now from whatever has been collected,
    /// without running the interview to completion. Used by callers that
    /// collected the fields through their own front end.
    pub async fn generate_immediately(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<String, String>, SessionError> {
        let context = self.store.get_context(session_id)?;
        let paper_content = self
            .generate_full_paper(session_id, &context.collected_info)
            .await?;

        let mut updates = Map::new();
        updates.insert(
            "paper_content".to_string(),
            serde_json::to_value(&paper_content).unwrap_or(Value::Null),
        );
        updates.insert(
            "current_stage".to_string(),
            serde_json::to_value(Stage::Completed).unwrap_or(Value::Null),
        );
        self.store.update_context(session_id, updates)?;
        self.store.set_status(session_id, SessionStatus::Completed)?;

        Ok(paper_content)
    }

    /// Re-run the loop for exactly one section, merging the new text into
    /// the existing paper. Bypasses the stage machine entirely; the
    /// collected information is assumed final.
    pub async fn regenerate_section(
        &self,
        session_id: &str,
        section: Section,
        additional_requirements: &str,
    ) -> Result<RegenerateResponse, SessionError> {
        let context = self.store.get_context(session_id)?;

        let outcome = self
            .engine
            .collaborative_generation(
                section,
                &context.collected_info,
                self.config.iterations,
                additional_requirements,
            )
            .await;

        let mut paper_content = context.paper_content;
        paper_content.insert(section.as_str().to_string(), outcome.final_content.clone());

        let mut updates = Map::new();
        updates.insert(
            "paper_content".to_string(),
            serde_json::to_value(&paper_content).unwrap_or(Value::Null),
        );
        updates.insert(
            format!("{}_generation_process", section.as_str()),
            serde_json::to_value(&outcome.iterations).unwrap_or(Value::Null),
        );
        self.store.update_context(session_id, updates)?;

        Ok(RegenerateResponse {
            session_id: session_id.to_string(),
            section: section.as_str().to_string(),
            content: outcome.final_content,
            status: outcome.status,
        })
    }

    /// The cached role-to-backend mapping, for diagnostics surfaces.
    pub fn assignments(&self) -> &crate::paperforge::roles::RoleAssignments {
        self.engine.assignments()
    }

    pub fn get_paper_content(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<String, String>, SessionError> {
        Ok(self.store.get_context(session_id)?.paper_content)
    }

    /// Render the assembled paper in the requested format.
    pub fn export_paper(
        &self,
        session_id: &str,
        format: ExportFormat,
    ) -> Result<String, SessionError> {
        let paper_content = self.get_paper_content(session_id)?;
        Ok(match format {
            ExportFormat::Markdown => export_as_markdown(&paper_content),
            ExportFormat::Text => export_as_text(&paper_content),
        })
    }
}

/// Markdown rendering. Sections absent from the mapping are skipped, and
/// identical input always yields byte-identical output.
pub fn export_as_markdown(paper_content: &BTreeMap<String, String>) -> String {
    let mut document = String::from("# Academic Paper\n\n---\n\n");
    for section in Section::ALL.iter() {
        if let Some(content) = paper_content.get(section.as_str()) {
            document.push_str(&format!("## {}\n\n", section.title()));
            document.push_str(content);
            document.push_str("\n\n");
        }
    }
    document
}

/// Plain-text rendering with ruled headings.
pub fn export_as_text(paper_content: &BTreeMap<String, String>) -> String {
    let rule = "=".repeat(60);
    let mut document = format!("{}\nAcademic Paper\n{}\n\n", rule, rule);
    for section in Section::ALL.iter() {
        if let Some(content) = paper_content.get(section.as_str()) {
            document.push_str(&format!("{}\n{}\n\n", section.title(), "-".repeat(60)));
            document.push_str(content);
            document.push_str("\n\n");
        }
    }
    document
}
