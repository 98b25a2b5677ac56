//! Transition engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::persistence::DEFAULT_QUEUE_CAPACITY;
use crate::domain::conversation::{EngineSettings, DEFAULT_APOLOGY};

const MAX_QUEUE_CAPACITY: usize = 65_536;

/// Engine tunables
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on one oracle call, in milliseconds
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_ms: u64,

    /// Upper bound on one node handler call, in milliseconds
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_ms: u64,

    /// Reply used when the oracle or a handler fails
    #[serde(default = "default_apology")]
    pub apology_text: String,

    /// Bound on pending persistence side effects
    #[serde(default = "default_queue_capacity")]
    pub side_effect_queue_capacity: usize,
}

impl EngineConfig {
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Settings for [`crate::domain::conversation::TransitionEngine`].
    pub fn to_settings(&self) -> EngineSettings {
        EngineSettings::default()
            .with_oracle_timeout(self.oracle_timeout())
            .with_handler_timeout(self.handler_timeout())
            .with_apology_text(self.apology_text.clone())
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.oracle_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("engine.oracle_timeout_ms"));
        }
        if self.handler_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("engine.handler_timeout_ms"));
        }
        if self.apology_text.trim().is_empty() {
            return Err(ValidationError::EmptyApology);
        }
        if self.side_effect_queue_capacity == 0
            || self.side_effect_queue_capacity > MAX_QUEUE_CAPACITY
        {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: default_oracle_timeout(),
            handler_timeout_ms: default_handler_timeout(),
            apology_text: default_apology(),
            side_effect_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_oracle_timeout() -> u64 {
    15_000
}

fn default_handler_timeout() -> u64 {
    10_000
}

fn default_apology() -> String {
    DEFAULT_APOLOGY.to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
