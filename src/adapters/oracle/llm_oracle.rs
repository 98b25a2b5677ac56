//! LLM-backed ReasoningOracle implementation

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::domain::conversation::{Context, InputAnalysis, OracleError, TurnRole};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, Message, OracleRequest, ReasoningOracle,
    RequestMetadata,
};

/// Routes a turn by asking a chat model to pick the next node and extract fields.
pub struct LlmOracle {
    ai_provider: Arc<dyn AIProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmOracle {
    pub fn new(ai_provider: Arc<dyn AIProvider>) -> Self {
        Self {
            ai_provider,
            temperature: 0.2,
            max_tokens: 600,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_prompt(&self, request: &OracleRequest) -> String {
        let candidates = request
            .candidates
            .iter()
            .map(|c| format!("- {}: {}", c.id, c.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are the routing brain of a friendly sales assistant on a company website.
Your job on every turn is to decide which conversation step comes next, pull any
customer details out of the visitor's message, and write the assistant's reply.

Current step: {current}

Candidate next steps:
{candidates}

Known customer details (JSON):
{context}

Rules:
- Prefer one of the candidate steps. Only pick another step if the visitor clearly changed topic.
- Extract only what the visitor actually said. Use the keys "name", "email" and
  "productChoice" for those details; other details may use short camelCase keys.
- Keep the reply short, warm, and ask for at most one missing detail.

Respond with a single JSON object and nothing else:
{{
  "nextNodeId": "one of the step ids",
  "userInputs": {{ "key": "value" }},
  "confidence": 0.0-1.0,
  "suggestedResponse": "the assistant's reply"
}}"#,
            current = request.current_node,
            candidates = if candidates.is_empty() {
                "- (none, stay on the current step)".to_string()
            } else {
                candidates
            },
            context = serde_json::to_string_pretty(&request.context.to_json())
                .unwrap_or_else(|_| "{}".to_string()),
        )
    }

    fn completion_request(&self, request: &OracleRequest) -> CompletionRequest {
        let metadata = RequestMetadata::new(
            request.session_id,
            format!("oracle-{}", uuid::Uuid::new_v4()),
        );

        let mut completion = CompletionRequest::new(metadata)
            .with_system_prompt(self.system_prompt(request))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_json_output();

        completion.messages = request
            .history
            .iter()
            .map(|entry| match entry.role {
                TurnRole::User => Message::user(entry.text.clone()),
                TurnRole::Assistant => Message::assistant(entry.text.clone()),
            })
            .chain(std::iter::once(Message::user(request.utterance.clone())))
            .collect();

        completion
    }
}

#[async_trait]
impl ReasoningOracle for LlmOracle {
    async fn analyze(&self, request: OracleRequest) -> Result<InputAnalysis, OracleError> {
        let completion = self
            .ai_provider
            .complete(self.completion_request(&request))
            .await
            .map_err(oracle_error)?;

        tracing::debug!(
            session_id = %request.session_id,
            model = %completion.model,
            total_tokens = completion.usage.total_tokens,
            "Oracle completion received"
        );

        parse_analysis(&completion.content)
    }
}

fn oracle_error(err: AIError) -> OracleError {
    match err {
        AIError::Timeout { timeout_secs } => OracleError::Timeout {
            timeout_ms: u64::from(timeout_secs) * 1000,
        },
        AIError::Parse(message) => OracleError::Malformed(message),
        other => OracleError::unavailable(other.to_string()),
    }
}

/// Parses a model reply into an analysis.
///
/// Accepts a bare JSON object, one wrapped in a ```json fence, or one
/// surrounded by stray prose.
pub fn parse_analysis(raw: &str) -> Result<InputAnalysis, OracleError> {
    let body = extract_json_object(raw)
        .ok_or_else(|| OracleError::malformed("no JSON object in oracle reply"))?;

    let parsed: JsonValue = serde_json::from_str(body)
        .map_err(|e| OracleError::malformed(format!("invalid JSON: {}", e)))?;

    let next_node_id = parsed
        .get("nextNodeId")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| OracleError::MissingField("nextNodeId".to_string()))?;

    let confidence = match parsed.get("confidence") {
        None | Some(JsonValue::Null) => return Err(OracleError::MissingField("confidence".to_string())),
        Some(value) => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| OracleError::malformed("confidence is not a number"))?,
    };

    let user_inputs = match parsed.get("userInputs") {
        None | Some(JsonValue::Null) => Context::new(),
        Some(JsonValue::Object(map)) => Context::from_json_object(map.clone()),
        Some(_) => return Err(OracleError::malformed("userInputs is not an object")),
    };

    let suggested_response = parsed
        .get("suggestedResponse")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();

    let analysis = InputAnalysis::new(
        next_node_id.trim(),
        user_inputs,
        confidence,
        suggested_response,
    );
    analysis.validate()?;
    Ok(analysis)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAIProvider;
    use crate::domain::conversation::{ContextValue, HistoryEntry, NodeId};
    use crate::domain::foundation::SessionId;
    use crate::ports::{CandidateNode, MessageRole};

    fn request() -> OracleRequest {
        let mut context = Context::new();
        context.insert("name", ContextValue::text("Alex"));
        OracleRequest {
            session_id: SessionId::new(),
            utterance: "alex@example.com".to_string(),
            history: vec![
                HistoryEntry::user("I'm Alex"),
                HistoryEntry::assistant("Nice to meet you! Your email?"),
            ],
            context,
            current_node: NodeId::from("collect_email"),
            candidates: vec![
                CandidateNode::new(NodeId::from("product_selection"), "Help pick a product"),
                CandidateNode::new(NodeId::from("product_question"), "Answer a question"),
            ],
        }
    }

    #[test]
    fn parses_plain_json() {
        let analysis = parse_analysis(
            r#"{"nextNodeId":"collect_email","userInputs":{"name":"Alex"},"confidence":0.9,"suggestedResponse":"Hi Alex"}"#,
        )
        .unwrap();

        assert_eq!(analysis.next_node_id, "collect_email");
        assert_eq!(analysis.user_inputs.text("name"), Some("Alex"));
        assert_eq!(analysis.confidence, 0.9);
        assert_eq!(analysis.suggested_response, "Hi Alex");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Sure!\n```json\n{\"nextNodeId\":\"welcome\",\"confidence\":\"0.4\"}\n```";
        let analysis = parse_analysis(raw).unwrap();

        assert_eq!(analysis.next_node_id, "welcome");
        assert_eq!(analysis.confidence, 0.4);
        assert!(analysis.user_inputs.is_empty());
        assert_eq!(analysis.suggested_response, "");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_analysis("I think we should collect the email"),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        assert_eq!(
            parse_analysis(r#"{"confidence":0.9}"#),
            Err(OracleError::MissingField("nextNodeId".to_string()))
        );
        assert_eq!(
            parse_analysis(r#"{"nextNodeId":"welcome"}"#),
            Err(OracleError::MissingField("confidence".to_string()))
        );
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(
            parse_analysis(r#"{"nextNodeId":"welcome","confidence":0.5,"userInputs":[1]}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            parse_analysis(r#"{"nextNodeId":"welcome","confidence":3}"#),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn null_user_inputs_are_dropped() {
        let analysis = parse_analysis(
            r#"{"nextNodeId":"welcome","confidence":0.5,"userInputs":{"name":null,"email":"a@x.com"}}"#,
        )
        .unwrap();

        assert!(analysis.user_inputs.get("name").is_none());
        assert_eq!(analysis.user_inputs.text("email"), Some("a@x.com"));
    }

    #[tokio::test]
    async fn sends_history_then_utterance_with_candidates_in_prompt() {
        let provider = MockAIProvider::new().with_response(
            r#"{"nextNodeId":"product_selection","userInputs":{"email":"alex@example.com"},"confidence":0.95,"suggestedResponse":"Thanks!"}"#,
        );
        let oracle = LlmOracle::new(Arc::new(provider.clone()));

        let analysis = oracle.analyze(request()).await.unwrap();

        assert_eq!(analysis.next_node_id, "product_selection");
        let calls = provider.get_calls();
        let sent = &calls[0];
        assert!(sent.json_output);
        assert_eq!(sent.messages.len(), 3);
        assert_eq!(sent.messages[1].role, MessageRole::Assistant);
        assert_eq!(sent.messages[2], Message::user("alex@example.com"));
        let system = sent.system_prompt.as_deref().unwrap();
        assert!(system.contains("- product_selection: Help pick a product"));
        assert!(system.contains("Current step: collect_email"));
        assert!(system.contains("\"Alex\""));
    }

    #[tokio::test]
    async fn maps_provider_errors() {
        let provider = MockAIProvider::new()
            .with_error(AIError::Timeout { timeout_secs: 2 })
            .with_error(AIError::AuthenticationFailed);
        let oracle = LlmOracle::new(Arc::new(provider));

        assert_eq!(
            oracle.analyze(request()).await,
            Err(OracleError::Timeout { timeout_ms: 2000 })
        );
        assert!(matches!(
            oracle.analyze(request()).await,
            Err(OracleError::Unavailable(_))
        ));
    }
}
