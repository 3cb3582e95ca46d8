use async_trait::async_trait;
use paperforge::backend::{BackendError, ChatBackend, ChatMessage};
use paperforge::extraction::{InfoExtractor, FIELD_SUPPLEMENTARY, FIELD_TOPIC};
use paperforge::registry::BackendRegistry;
use serde_json::Value;
use std::sync::Arc;

struct FixedBackend {
    reply: Result<String, String>,
}

#[async_trait]
impl ChatBackend for FixedBackend {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, BackendError> {
        self.reply
            .clone()
            .map_err(BackendError::Transport)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

fn extractor_replying(reply: Result<&str, &str>) -> InfoExtractor {
    let mut registry = BackendRegistry::new();
    registry.register(
        "mock",
        Arc::new(FixedBackend {
            reply: reply.map(str::to_string).map_err(str::to_string),
        }),
    );
    InfoExtractor::new(Arc::new(registry))
}

#[tokio::test]
async fn structured_reply_is_parsed_into_fields() {
    let extractor = extractor_replying(Ok(
        "Here is what I extracted:\n{\"research topic\": \"urban heat islands\", \
         \"research method\": \"field measurement\"}",
    ));
    let fields = extractor.extract("I study urban heat islands.", "initial").await;
    assert_eq!(
        fields.get(FIELD_TOPIC).and_then(Value::as_str),
        Some("urban heat islands")
    );
    assert_eq!(fields.len(), 2);
}

#[tokio::test]
async fn reply_without_json_falls_back_to_supplementary_field() {
    let extractor = extractor_replying(Ok("I could not find anything structured."));
    let turn = "Free-form thoughts about my study.";
    let fields = extractor.extract(turn, "results").await;
    assert_eq!(fields.len(), 1);
    assert_eq!(
        fields.get(FIELD_SUPPLEMENTARY).and_then(Value::as_str),
        Some(turn)
    );
}

#[tokio::test]
async fn malformed_json_falls_back_to_supplementary_field() {
    let extractor = extractor_replying(Ok("{\"research topic\": unquoted}"));
    let turn = "My topic is X.";
    let fields = extractor.extract(turn, "initial").await;
    assert_eq!(
        fields.get(FIELD_SUPPLEMENTARY).and_then(Value::as_str),
        Some(turn)
    );
}

#[tokio::test]
async fn transport_failure_falls_back_to_supplementary_field() {
    let extractor = extractor_replying(Err("connection refused"));
    let turn = "Some detail.";
    let fields = extractor.extract(turn, "discussion").await;
    assert_eq!(fields.len(), 1);
    assert_eq!(
        fields.get(FIELD_SUPPLEMENTARY).and_then(Value::as_str),
        Some(turn)
    );
}

#[tokio::test]
async fn missing_backend_falls_back_to_supplementary_field() {
    let extractor = InfoExtractor::new(Arc::new(BackendRegistry::new()));
    let turn = "No backend anywhere.";
    let fields = extractor.extract(turn, "initial").await;
    assert_eq!(
        fields.get(FIELD_SUPPLEMENTARY).and_then(Value::as_str),
        Some(turn)
    );
}
