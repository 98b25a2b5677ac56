//! ScheduleDemo node handler.
//!
//! Runs when a turn lands on `schedule_demo`. With the lead's name, email
//! and product choice captured it records a `demo_requested` event and
//! confirms; otherwise it asks for the first missing detail.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::domain::conversation::{
    HandlerBinding, HandlerError, HandlerInput, HandlerReply, NodeHandler, WellKnownKey,
};
use crate::ports::{LeadEvent, SideEffect, SideEffectSink};

/// Name of the event recorded for a booked demo.
pub const DEMO_REQUESTED_EVENT: &str = "demo_requested";

/// Books demos by recording a lead event.
pub struct ScheduleDemoHandler {
    side_effects: Arc<dyn SideEffectSink>,
}

impl ScheduleDemoHandler {
    pub fn new(side_effects: Arc<dyn SideEffectSink>) -> Self {
        Self { side_effects }
    }

    /// Binds the handler so its confirmation replaces the oracle's reply.
    pub fn binding(side_effects: Arc<dyn SideEffectSink>) -> HandlerBinding {
        HandlerBinding::replacing(Arc::new(Self::new(side_effects)))
    }
}

fn ask_for(key: WellKnownKey) -> &'static str {
    match key {
        WellKnownKey::Name => "Happy to set up a demo! Who should I put the booking under?",
        WellKnownKey::Email => "Great! What email address should I send the demo invite to?",
        WellKnownKey::ProductChoice => "Which product would you like to see in the demo?",
    }
}

#[async_trait]
impl NodeHandler for ScheduleDemoHandler {
    fn name(&self) -> &str {
        "schedule_demo"
    }

    async fn handle(&self, input: HandlerInput<'_>) -> Result<HandlerReply, HandlerError> {
        let context = input.context;

        if let Some(missing) = WellKnownKey::ALL
            .iter()
            .copied()
            .find(|key| !context.has_known(*key))
        {
            return Ok(HandlerReply::new(ask_for(missing)));
        }

        let text = |key: WellKnownKey| {
            context
                .get_known(key)
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        let name = text(WellKnownKey::Name);
        let email = text(WellKnownKey::Email);
        let product = text(WellKnownKey::ProductChoice);

        let event = LeadEvent::new(
            input.session.session_id,
            DEMO_REQUESTED_EVENT,
            json!({
                "name": name,
                "email": email,
                "productChoice": product,
            }),
        )
        .with_metadata(json!({
            "nodeId": input.session.current_node_id.as_str(),
            "utterance": input.utterance,
            "turn": input.session.user_turns(),
        }));

        if let Err(err) = self.side_effects.submit(SideEffect::RecordEvent(event)) {
            tracing::warn!(
                session_id = %input.session.session_id,
                error = %err,
                "Demo request event dropped"
            );
        }

        Ok(HandlerReply::new(format!(
            "You're all set, {}! I've requested a {} demo and we'll send the details to {}.",
            name, product, email
        )))
    }
}
