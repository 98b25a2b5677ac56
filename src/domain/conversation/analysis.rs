//! Oracle input analysis and deterministic fallback extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::{Context, ContextValue, WellKnownKey};
use super::errors::OracleError;
use super::node::NodeId;

/// Maximum characters kept when treating raw input as a name.
pub const MAX_FALLBACK_NAME_LENGTH: usize = 80;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}")
        .expect("email pattern is valid")
});

static NAME_LEAD_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:hi|hello|hey)?[\s,!.]*(?:my name is|my name's|i am|i'm|im|this is|call me|it's|it is)\s+")
        .expect("lead-in pattern is valid")
});

/// The oracle's proposal for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAnalysis {
    pub next_node_id: NodeId,
    pub user_inputs: Context,
    pub confidence: f64,
    pub suggested_response: String,
}

impl InputAnalysis {
    pub fn new(
        next_node_id: impl Into<NodeId>,
        user_inputs: Context,
        confidence: f64,
        suggested_response: impl Into<String>,
    ) -> Self {
        Self {
            next_node_id: next_node_id.into(),
            user_inputs,
            confidence,
            suggested_response: suggested_response.into(),
        }
    }

    /// Rejects shapes the engine must not apply.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.next_node_id.as_str().trim().is_empty() {
            return Err(OracleError::MissingField("nextNodeId".to_string()));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(OracleError::malformed(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }

    /// Degraded analysis used when the oracle cannot be trusted for a turn.
    pub fn fallback(utterance: &str, next_node_id: NodeId, apology: &str) -> Self {
        Self {
            next_node_id,
            user_inputs: extract_fallback_fields(utterance),
            confidence: 0.5,
            suggested_response: apology.to_string(),
        }
    }
}

/// Deterministic field extraction.
///
/// An email-shaped token becomes the email field; otherwise non-empty
/// input becomes the name field, minus a conversational lead-in such as
/// "my name is".
pub fn extract_fallback_fields(utterance: &str) -> Context {
    let mut fields = Context::new();

    if let Some(email) = EMAIL.find(utterance) {
        fields.insert_known(WellKnownKey::Email, ContextValue::text(email.as_str()));
        return fields;
    }

    let name = NAME_LEAD_IN.replace(utterance, "");
    let name = name.trim().trim_end_matches(|c: char| matches!(c, '.' | '!' | '?')).trim();
    if !name.is_empty() {
        let name: String = name.chars().take(MAX_FALLBACK_NAME_LENGTH).collect();
        fields.insert_known(WellKnownKey::Name, ContextValue::text(name));
    }

    fields
}
