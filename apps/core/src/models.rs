use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a chat conversation as assigned by the transport.
pub type ChatId = i64;

/// Template variables supplied at run start (e.g. `client_name`, `my_name`).
pub type Vars = HashMap<String, String>;

/// Status tag written for every lead captured by a script run.
pub const LEAD_STATUS_PROCESSED: &str = "processed";

/// Agent name used when a run does not supply `my_name`.
pub const DEFAULT_AGENT_NAME: &str = "Никита";

/// A qualified contact captured during a `free_text` transition.
///
/// Built by the engine and handed straight to the recorder; nothing keeps it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// When the contact was captured.
    pub timestamp: DateTime<Utc>,
    /// Display name of the client, from `vars.client_name`.
    pub client_name: String,
    /// The trimmed reply text (phone, e-mail, handle...).
    pub contact: String,
    /// Conversation the lead came from. Used as the upsert key.
    pub conversation_id: ChatId,
    /// Processing status tag.
    pub status: String,
    /// Responsible agent, from `vars.my_name`.
    pub agent: String,
}

impl LeadRecord {
    /// Builds a lead for `contact` using the run variables for client and agent names.
    pub fn from_vars(
        conversation_id: ChatId,
        contact: String,
        vars: &Vars,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let agent = vars
            .get("my_name")
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());
        Self {
            timestamp,
            client_name: vars.get("client_name").cloned().unwrap_or_default(),
            contact,
            conversation_id,
            status: LEAD_STATUS_PROCESSED.to_string(),
            agent,
        }
    }
}
