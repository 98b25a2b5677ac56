//! Node handler dispatch.
//!
//! A handler is a side-effect routine bound to exactly one node and run
//! only when a turn lands on that node. Dispatch is isolated: a handler
//! error, timeout or panic never aborts the turn.

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::context::Context;
use super::errors::HandlerError;
use super::node::ReplyPolicy;
use super::session::{HistoryEntry, Session};

/// Everything a handler may observe about the turn that landed on its node.
///
/// `context` is already merged with this turn's extracted fields and
/// `history` already ends with this turn's user entry.
#[derive(Debug, Clone, Copy)]
pub struct HandlerInput<'a> {
    pub utterance: &'a str,
    pub history: &'a [HistoryEntry],
    pub context: &'a Context,
    pub session: &'a Session,
}

/// Text produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReply {
    pub reply_text: String,
}

impl HandlerReply {
    pub fn new(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
        }
    }
}

/// A side-effect routine bound to a node.
///
/// Handlers may be invoked more than once for the same logical turn when
/// the transport retries; external effects should tolerate duplicates.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs the handler for one turn.
    async fn handle(&self, input: HandlerInput<'_>) -> Result<HandlerReply, HandlerError>;
}

/// A handler together with the reply policy of the node it is bound to.
#[derive(Clone)]
pub struct HandlerBinding {
    handler: Arc<dyn NodeHandler>,
    policy: ReplyPolicy,
}

impl HandlerBinding {
    pub fn new(handler: Arc<dyn NodeHandler>, policy: ReplyPolicy) -> Self {
        Self { handler, policy }
    }

    /// Binds a handler whose text replaces the oracle reply.
    pub fn replacing(handler: Arc<dyn NodeHandler>) -> Self {
        Self::new(handler, ReplyPolicy::ReplaceReply)
    }

    /// Binds a handler whose text is used only when the oracle gave none.
    pub fn supplementing(handler: Arc<dyn NodeHandler>) -> Self {
        Self::new(handler, ReplyPolicy::SupplementReply)
    }

    pub fn policy(&self) -> ReplyPolicy {
        self.policy
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Runs the handler bounded by `timeout`, converting timeouts and
    /// panics into [`HandlerError`].
    pub async fn dispatch(
        &self,
        input: HandlerInput<'_>,
        timeout: Duration,
    ) -> Result<HandlerReply, HandlerError> {
        let guarded = AssertUnwindSafe(self.handler.handle(input)).catch_unwind();

        match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(HandlerError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("handler", &self.handler.name())
            .field("policy", &self.policy)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
