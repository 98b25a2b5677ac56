//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps and error codes used across the Lead Flow domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::{ErrorCode, ValidationError};
pub use ids::{ConnectionId, SessionId};
pub use timestamp::Timestamp;
