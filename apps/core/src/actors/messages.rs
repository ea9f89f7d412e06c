use crate::engine::state::{RunStatus, Terminal};
use crate::models::{ChatId, Vars};
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// The scheduler actor is gone (shut down or panicked).
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Per-run options supplied by the operator. Unset fields fall back to the script defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub delay_min_ms: Option<u64>,
    pub delay_max_ms: Option<u64>,
}

/// Messages that can be sent to the `SchedulerActor`.
#[derive(Debug)]
pub enum SchedulerMessage {
    /// Replace any run with continuous emission. `None` uses the conversation's preferred interval.
    StartContinuous {
        chat_id: ChatId,
        interval_ms: Option<u64>,
        /// Receives the clamped interval actually used.
        responder: oneshot::Sender<Result<u64, AppError>>,
    },
    /// Store a preferred interval, restarting an active continuous run with it.
    SetInterval {
        chat_id: ChatId,
        interval_ms: u64,
        responder: oneshot::Sender<Result<u64, AppError>>,
    },
    /// Replace any run with a new script run.
    StartScript {
        chat_id: ChatId,
        vars: Vars,
        options: RunOptions,
        responder: oneshot::Sender<Result<Uuid, AppError>>,
    },
    /// Cancel and remove the run. Replies whether a run existed.
    Stop {
        chat_id: ChatId,
        responder: oneshot::Sender<bool>,
    },
    Status {
        chat_id: ChatId,
        responder: oneshot::Sender<Option<RunStatus>>,
    },
    /// An inbound user message. Replies whether a waiting run consumed it.
    Deliver {
        chat_id: ChatId,
        text: String,
        responder: oneshot::Sender<bool>,
    },
    /// Sent by a run's own task when it ends by itself.
    RunFinished {
        chat_id: ChatId,
        run_id: Uuid,
        terminal: Terminal,
    },
    /// A command to cancel every run and stop the scheduler.
    Shutdown { responder: oneshot::Sender<()> },
}
