//! Node prompt templates.
//!
//! Placeholders use `{{key}}` syntax and resolve against the session
//! context. Unknown or blank keys render as an empty string.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::context::Context;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// A prompt template with `{{key}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder keys referenced by this template, in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        PLACEHOLDER
            .captures_iter(&self.0)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Renders the template. Pure: the same context always yields the same text.
    pub fn render(&self, context: &Context) -> String {
        let rendered = PLACEHOLDER.replace_all(&self.0, |caps: &Captures| {
            context
                .get(&caps[1])
                .filter(|v| !v.is_blank())
                .map(|v| v.to_string())
                .unwrap_or_default()
        });
        tidy(&rendered)
    }
}

impl From<&str> for PromptTemplate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PromptTemplate {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// Collapses the gaps an empty substitution leaves behind ("Hi , there" -> "Hi, there").
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let glue = word.starts_with(|c: char| matches!(c, ',' | '.' | '!' | '?' | ';' | ':'));
        if glue && out.ends_with(',') {
            out.pop();
        }
        if !out.is_empty() && !glue {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
