//! SideEffectQueue - Background delivery of persistence side effects.
//!
//! Turns hand effects to the queue with [`SideEffectSink::submit`], which
//! never waits: a full queue rejects the effect immediately. A single
//! worker task applies effects in submission order through a
//! [`ConversationRecorder`], logging failures instead of surfacing them.
//!
//! ## Graceful Shutdown
//!
//! [`SideEffectWorker::shutdown`] stops intake, drains what is already
//! queued, and returns delivery counts.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::ports::{ConversationRecorder, PersistenceError, SideEffect, SideEffectSink};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Delivery counts reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: usize,
    pub failed: usize,
}

/// Sending half: cheap to clone, shared by the coordinator and handlers.
#[derive(Debug, Clone)]
pub struct SideEffectQueue {
    sender: mpsc::Sender<SideEffect>,
    capacity: usize,
}

/// Handle to the worker task.
#[derive(Debug)]
pub struct SideEffectWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<DrainStats>,
}

impl SideEffectQueue {
    /// Creates the queue and spawns its worker on the current runtime.
    pub fn spawn(
        recorder: Arc<dyn ConversationRecorder>,
        capacity: usize,
    ) -> (Self, SideEffectWorker) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_worker(recorder, receiver, shutdown_rx));

        (
            Self { sender, capacity },
            SideEffectWorker {
                shutdown: shutdown_tx,
                handle,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl SideEffectSink for SideEffectQueue {
    fn submit(&self, effect: SideEffect) -> Result<(), PersistenceError> {
        self.sender.try_send(effect).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PersistenceError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => PersistenceError::QueueClosed,
        })
    }
}

impl SideEffectWorker {
    /// Stops accepting effects, drains the queue and waits for the worker.
    pub async fn shutdown(self) -> DrainStats {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!(error = %err, "Side-effect worker terminated abnormally");
                DrainStats::default()
            }
        }
    }
}

async fn run_worker(
    recorder: Arc<dyn ConversationRecorder>,
    mut receiver: mpsc::Receiver<SideEffect>,
    mut shutdown: watch::Receiver<bool>,
) -> DrainStats {
    let mut stats = DrainStats::default();

    loop {
        tokio::select! {
            biased;

            next = receiver.recv() => match next {
                Some(effect) => apply(recorder.as_ref(), effect, &mut stats).await,
                None => break,
            },

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    receiver.close();
                    while let Some(effect) = receiver.recv().await {
                        apply(recorder.as_ref(), effect, &mut stats).await;
                    }
                    break;
                }
            }
        }
    }

    tracing::info!(
        applied = stats.applied,
        failed = stats.failed,
        "Side-effect worker stopped"
    );
    stats
}

async fn apply(recorder: &dyn ConversationRecorder, effect: SideEffect, stats: &mut DrainStats) {
    match recorder.apply(&effect).await {
        Ok(()) => stats.applied += 1,
        Err(err) => {
            stats.failed += 1;
            tracing::warn!(
                session_id = %effect.session_id(),
                effect = effect.kind(),
                error = %err,
                "Persistence side effect failed"
            );
        }
    }
}
