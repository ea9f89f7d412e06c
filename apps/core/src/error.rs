use std::io;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// The script definition is unreadable or malformed.
    #[error("Script load error: {0}")]
    ScriptLoad(String),

    /// A branch target references a step id that does not exist in the loaded script.
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// Message delivery failed. Carries the provider-reported code and description.
    #[error("Transport error ({}): {description}", display_code(.code))]
    Transport {
        code: Option<i64>,
        description: String,
    },

    /// Lead persistence failed.
    #[error("Recorder error: {0}")]
    Recorder(String),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents errors specific to the actor system, such as communication failures.
    #[error("Actor error: {0}")]
    Actor(#[from] crate::actors::messages::ActorError),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents HTTP client failures that are not a provider-reported delivery error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

fn display_code(code: &Option<i64>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::ScriptLoad(s) => AppError::ScriptLoad(s.clone()),
            AppError::StepNotFound(s) => AppError::StepNotFound(s.clone()),
            AppError::Transport { code, description } => AppError::Transport {
                code: *code,
                description: description.clone(),
            },
            AppError::Recorder(s) => AppError::Recorder(s.clone()),
            AppError::Io(e) => AppError::Io(io::Error::new(e.kind(), e.to_string())),
            AppError::Actor(e) => AppError::Actor(e.clone()),
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Http(s) => AppError::Http(s.clone()),
            AppError::Timeout(s) => AppError::Timeout(s.clone()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ScriptLoad(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("URL parse error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(format!("Validation errors: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Http(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Recorder(format!("CSV error: {}", err))
    }
}
