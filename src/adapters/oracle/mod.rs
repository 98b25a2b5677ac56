//! Reasoning oracle adapters.
//!
//! - `LlmOracle` - Prompts an `AIProvider` and parses its JSON reply
//! - `ScriptedOracle` - Replays canned analyses (tests, demos)

mod llm_oracle;
mod scripted;

pub use llm_oracle::{parse_analysis, LlmOracle};
pub use scripted::ScriptedOracle;
