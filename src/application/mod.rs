//! Application layer - Connection coordination and node handlers.
//!
//! This layer sits between the transport and the domain: it owns sessions
//! per connection and implements handlers that reach out through ports.

mod schedule_demo;
mod turn_coordinator;

pub use schedule_demo::{ScheduleDemoHandler, DEMO_REQUESTED_EVENT};
pub use turn_coordinator::{
    CoordinatorError, Greeting, TurnCoordinator, TurnReply, MAX_MESSAGE_CHARS,
};
