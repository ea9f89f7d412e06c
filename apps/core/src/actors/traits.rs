use crate::error::AppError;
use crate::models::{ChatId, LeadRecord};
use async_trait::async_trait;

/// Defines the outbound side of a chat platform.
///
/// This trait abstracts the specific messenger, allowing the scheduler and the
/// engine to be driven by a real bot API or by an in-memory mock.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one text message. A conversation that cannot be reached yields
    /// `AppError::Transport` carrying the provider's code and description.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), AppError>;
}

/// Defines where captured leads are persisted.
#[async_trait]
pub trait LeadRecorder: Send + Sync + 'static {
    /// Overwrites the row for `record.conversation_id`, or appends a new one.
    async fn upsert(&self, record: &LeadRecord) -> Result<(), AppError>;
}
