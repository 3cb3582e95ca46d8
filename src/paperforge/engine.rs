//! Multi-role collaborative generation.
//!
//! The engine fans work out to the four collaboration roles, one blocking
//! round trip at a time: the collector asks the next interview questions,
//! and the generate/review/optimize/improve cycle refines one paper section
//! per call. Role calls use the temperature and output ceiling of the
//! role's static configuration; which backend serves which role comes from
//! the cached [`RoleAssignments`].
//!
//! Failure policy: the single collector call degrades to an apologetic
//! message, while any backend failure inside the generation loop aborts the
//! remaining iterations and returns whatever content the loop had last
//! completed, flagged with an error status. Partial progress is never
//! discarded.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::paperforge::backend::ChatMessage;
use crate::paperforge::generator::{Section, Stage};
use crate::paperforge::prompts;
use crate::paperforge::registry::{BackendRegistry, RegistryError};
use crate::paperforge::roles::{Role, RoleAssignments};

/// Temperature for the improvement pass; deliberately below the content
/// generator's default so revisions stay close to the reviewed draft.
const IMPROVEMENT_TEMPERATURE: f64 = 0.7;

/// How many trailing transcript messages the collector sees.
const COLLECTOR_HISTORY_LIMIT: usize = 6;

/// What a single loop step produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationKind {
    InitialGeneration,
    QualityReview,
    StructureOptimization,
    ImprovedGeneration,
}

/// One step of the generation loop's trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 0 for the initial generation, then 1-based refinement rounds.
    pub iteration: usize,
    #[serde(rename = "type")]
    pub kind: IterationKind,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Success,
    Error,
}

/// Result of one collaborative-generation run for a section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub section: String,
    /// Content after the last completed step; empty only if the very first
    /// generation failed.
    pub final_content: String,
    /// Ordered trace of every completed step.
    pub iterations: Vec<IterationRecord>,
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drives the four collaboration roles against the backend registry.
pub struct CollaborationEngine {
    registry: Arc<BackendRegistry>,
    assignments: RoleAssignments,
}

impl CollaborationEngine {
    pub fn new(registry: Arc<BackendRegistry>, assignments: RoleAssignments) -> Self {
        CollaborationEngine {
            registry,
            assignments,
        }
    }

    pub fn assignments(&self) -> &RoleAssignments {
        &self.assignments
    }

    /// One role call with the role's configured sampling bounds.
    async fn chat_as(
        &self,
        role: Role,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, RegistryError> {
        let config = role.config();
        self.registry
            .chat(
                messages,
                self.assignments.backend_for(role),
                temperature,
                config.max_tokens,
            )
            .await
    }

    /// Collector role: look at what is known, ask the next questions.
    ///
    /// Degrades to an apologetic message on backend failure; the interview
    /// must keep flowing even when no model is reachable.
    pub async fn collect_information(
        &self,
        current_stage: Stage,
        collected_info: &Map<String, Value>,
        history: &[ChatMessage],
    ) -> String {
        let role = Role::InformationCollector;
        let prompt = prompts::render(
            prompts::COLLECTOR_PROMPT,
            &[
                ("collected_info", &prompts::format_collected_info(collected_info)),
                ("current_stage", current_stage.as_str()),
            ],
        );

        let mut messages = vec![ChatMessage::system(role.config().description)];
        let tail_start = history.len().saturating_sub(COLLECTOR_HISTORY_LIMIT);
        messages.extend_from_slice(&history[tail_start..]);
        messages.push(ChatMessage::user(prompt));

        match self.chat_as(role, &messages, role.config().temperature).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("information collection call failed: {}", err);
                format!(
                    "I am sorry, I could not reach a language model backend to \
                     continue the interview ({}). Please try again shortly.",
                    err
                )
            }
        }
    }

    /// Generator role: produce a section draft from the collected fields.
    pub async fn generate_section(
        &self,
        section: Section,
        collected_info: &Map<String, Value>,
        requirements: &str,
    ) -> Result<String, RegistryError> {
        let role = Role::ContentGenerator;
        let mut prompt = prompts::render(
            prompts::content_generation_template(section.as_str()),
            &[("collected_info", &prompts::format_collected_info(collected_info))],
        );
        if !requirements.is_empty() {
            prompt.push_str("\n\nAdditional requirements:\n");
            prompt.push_str(requirements);
        }

        let messages = [
            ChatMessage::system(role.config().description),
            ChatMessage::user(prompt),
        ];
        self.chat_as(role, &messages, role.config().temperature).await
    }

    /// Reviewer role: critique a draft.
    pub async fn review_section(
        &self,
        content: &str,
        section: Section,
    ) -> Result<String, RegistryError> {
        let role = Role::QualityReviewer;
        let prompt = format!(
            "Review the following content from the paper's {} section:\n\n{}",
            section.as_str(),
            prompts::render(prompts::QUALITY_REVIEW, &[("content", content)])
        );
        let messages = [
            ChatMessage::system(role.config().description),
            ChatMessage::user(prompt),
        ];
        self.chat_as(role, &messages, role.config().temperature).await
    }

    /// Optimizer role: restructure a draft.
    pub async fn optimize_section(
        &self,
        content: &str,
        section: Section,
    ) -> Result<String, RegistryError> {
        let role = Role::StructureOptimizer;
        let prompt = format!(
            "Optimize the structure of the following content from the paper's {} section:\n\n{}",
            section.as_str(),
            prompts::render(prompts::STRUCTURE_OPTIMIZATION, &[("content", content)])
        );
        let messages = [
            ChatMessage::system(role.config().description),
            ChatMessage::user(prompt),
        ];
        self.chat_as(role, &messages, role.config().temperature).await
    }

    /// Generator role again, fed the draft plus review and optimization
    /// feedback, asked for an improved version.
    async fn improve_section(
        &self,
        content: &str,
        review: &str,
        optimization: &str,
    ) -> Result<String, RegistryError> {
        let role = Role::ContentGenerator;
        let prompt = prompts::render(
            prompts::IMPROVEMENT,
            &[
                ("content", content),
                ("review", review),
                ("optimization", optimization),
            ],
        );
        let messages = [
            ChatMessage::system(role.config().description),
            ChatMessage::user(prompt),
        ];
        self.chat_as(role, &messages, IMPROVEMENT_TEMPERATURE).await
    }

    /// Run the full generate -> (review, optimize, improve) x N cycle for
    /// one section and return the final text plus the whole trace.
    pub async fn collaborative_generation(
        &self,
        section: Section,
        collected_info: &Map<String, Value>,
        iterations: usize,
        requirements: &str,
    ) -> GenerationOutcome {
        let mut outcome = GenerationOutcome {
            section: section.as_str().to_string(),
            final_content: String::new(),
            iterations: Vec::new(),
            status: GenerationStatus::Success,
            error: None,
        };

        info!("generating initial {} content", section.as_str());
        let mut current = match self
            .generate_section(section, collected_info, requirements)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                outcome.status = GenerationStatus::Error;
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        outcome.iterations.push(IterationRecord {
            iteration: 0,
            kind: IterationKind::InitialGeneration,
            content: current.clone(),
        });

        for i in 1..=iterations {
            info!("refinement round {} for {}", i, section.as_str());

            let review = match self.review_section(&current, section).await {
                Ok(text) => text,
                Err(err) => {
                    outcome.status = GenerationStatus::Error;
                    outcome.error = Some(err.to_string());
                    break;
                }
            };
            outcome.iterations.push(IterationRecord {
                iteration: i,
                kind: IterationKind::QualityReview,
                content: review.clone(),
            });

            let optimization = match self.optimize_section(&current, section).await {
                Ok(text) => text,
                Err(err) => {
                    outcome.status = GenerationStatus::Error;
                    outcome.error = Some(err.to_string());
                    break;
                }
            };
            outcome.iterations.push(IterationRecord {
                iteration: i,
                kind: IterationKind::StructureOptimization,
                content: optimization.clone(),
            });

            let improved = match self.improve_section(&current, &review, &optimization).await {
                Ok(text) => text,
                Err(err) => {
                    outcome.status = GenerationStatus::Error;
                    outcome.error = Some(err.to_string());
                    break;
                }
            };
            outcome.iterations.push(IterationRecord {
                iteration: i,
                kind: IterationKind::ImprovedGeneration,
                content: improved.clone(),
            });
            current = improved;
        }

        outcome.final_content = current;
        outcome
    }
}
