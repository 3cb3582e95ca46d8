//! Structured-information extraction from free-text user turns.
//!
//! One backend call per turn asks the model to pull a bounded vocabulary of
//! research fields out of the user's message and answer in JSON. The parse
//! is best-effort: the first brace-delimited substring of the reply is
//! tried, and on any failure at all (malformed JSON, absent backend,
//! transport error) the whole turn is stored under a single catch-all field
//! instead. Extraction never fails past its own boundary.

use log::warn;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::paperforge::backend::ChatMessage;
use crate::paperforge::registry::BackendRegistry;

pub const FIELD_TOPIC: &str = "research topic";
pub const FIELD_BACKGROUND: &str = "research background";
pub const FIELD_OBJECTIVE: &str = "research objective";
pub const FIELD_METHOD: &str = "research method";
pub const FIELD_DATA_SOURCE: &str = "data source";
pub const FIELD_FINDINGS: &str = "research findings";
pub const FIELD_THEORETICAL_BASIS: &str = "theoretical basis";
pub const FIELD_CITATIONS: &str = "literature citations";
pub const FIELD_RESEARCH_QUESTION: &str = "research question";
pub const FIELD_SIGNIFICANCE: &str = "research significance";
pub const FIELD_LIMITATIONS: &str = "research limitations";
pub const FIELD_FUTURE_DIRECTIONS: &str = "future directions";

/// Catch-all field used whenever structured extraction fails.
pub const FIELD_SUPPLEMENTARY: &str = "user supplementary info";

/// Everything the extractor asks the model to look for.
pub const EXTRACTABLE_FIELDS: [&str; 12] = [
    FIELD_TOPIC,
    FIELD_BACKGROUND,
    FIELD_OBJECTIVE,
    FIELD_METHOD,
    FIELD_DATA_SOURCE,
    FIELD_FINDINGS,
    FIELD_THEORETICAL_BASIS,
    FIELD_CITATIONS,
    FIELD_RESEARCH_QUESTION,
    FIELD_SIGNIFICANCE,
    FIELD_LIMITATIONS,
    FIELD_FUTURE_DIRECTIONS,
];

const EXTRACTION_TEMPERATURE: f64 = 0.3;
const EXTRACTION_MAX_TOKENS: u32 = 1000;

/// Turns one free-text user turn into a partial field mapping.
pub struct InfoExtractor {
    registry: Arc<BackendRegistry>,
}

impl InfoExtractor {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        InfoExtractor { registry }
    }

    /// Extract whatever research fields the turn mentions.
    ///
    /// Always returns a mapping; the guaranteed fallback is
    /// `{FIELD_SUPPLEMENTARY: <raw turn>}`.
    pub async fn extract(&self, user_input: &str, stage: &str) -> Map<String, Value> {
        let prompt = build_extraction_prompt(user_input, stage);
        let messages = [
            ChatMessage::system(
                "You are an information-extraction expert, skilled at pulling \
                 structured information out of free text.",
            ),
            ChatMessage::user(prompt),
        ];

        match self
            .registry
            .chat(&messages, None, EXTRACTION_TEMPERATURE, EXTRACTION_MAX_TOKENS)
            .await
        {
            Ok(response) => match parse_field_mapping(&response) {
                Some(fields) => fields,
                None => fallback(user_input),
            },
            Err(err) => {
                warn!("information extraction failed: {}", err);
                fallback(user_input)
            }
        }
    }
}

fn build_extraction_prompt(user_input: &str, stage: &str) -> String {
    let mut field_list = String::new();
    for field in EXTRACTABLE_FIELDS.iter() {
        field_list.push_str("- ");
        field_list.push_str(field);
        field_list.push('\n');
    }
    format!(
        "Extract the academic-paper-related information from the user input below and \
         return it as a structured object.\n\nUser input:\n{}\n\nCurrent stage: {}\n\n\
         Extract the following kinds of information, when present:\n{}\n\
         Answer with the extracted information as JSON, for example:\n\
         {{\n    \"{}\": \"...\",\n    \"{}\": \"...\"\n}}\n\n\
         Omit any field that is not present in the input.",
        user_input, stage, field_list, FIELD_TOPIC, FIELD_BACKGROUND
    )
}

fn fallback(user_input: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        FIELD_SUPPLEMENTARY.to_string(),
        Value::String(user_input.to_string()),
    );
    fields
}

/// Try to parse the first brace-delimited JSON object in `response`.
fn parse_field_mapping(response: &str) -> Option<Map<String, Value>> {
    let candidate = first_json_object(response)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

/// Locate the first balanced `{...}` substring.
///
/// Brace counting respects JSON string literals so that a `}` inside a
/// quoted value does not close the object early.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_object_embedded_in_prose() {
        let text = "Sure! Here is what I found: {\"research topic\": \"urban heat\"} Hope it helps.";
        let fields = parse_field_mapping(text).unwrap();
        assert_eq!(
            fields.get(FIELD_TOPIC).and_then(Value::as_str),
            Some("urban heat")
        );
    }

    #[test]
    fn brace_inside_string_does_not_close_object() {
        let text = "{\"research method\": \"grounded theory {iterative}\"}";
        let fields = parse_field_mapping(text).unwrap();
        assert_eq!(
            fields.get(FIELD_METHOD).and_then(Value::as_str),
            Some("grounded theory {iterative}")
        );
    }

    #[test]
    fn no_object_yields_none() {
        assert!(parse_field_mapping("no structured data here").is_none());
        assert!(parse_field_mapping("unbalanced { brace").is_none());
    }
}
