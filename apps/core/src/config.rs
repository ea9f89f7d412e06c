use crate::error::AppError;
use crate::fs_manager::PortablePathManager;
use crate::telemetry::LogFormat;
use std::env;
use std::path::PathBuf;
use validator::Validate;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    /// Bot API token (`TELEGRAM_BOT_TOKEN`).
    #[validate(length(min = 1))]
    pub bot_token: String,
    /// Bot API root (`TELEGRAM_API_URL`).
    #[validate(url)]
    pub api_url: String,
    /// Script definition file (`SCRIPT_PATH`).
    pub script_path: PathBuf,
    /// Lead sheet file (`LEADS_PATH`).
    pub leads_path: PathBuf,
    /// Continuous-mode interval when none is given (`DEFAULT_INTERVAL_MS`).
    #[validate(range(min = 2000, max = 60000))]
    pub default_interval_ms: u64,
    /// Long-poll timeout (`POLL_TIMEOUT_SECS`).
    #[validate(range(min = 1, max = 50))]
    pub poll_timeout_secs: u64,
    /// `LOG_FORMAT`: `json` or `pretty`.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        Self::from_process_env()
    }

    /// Reads the process environment only.
    pub fn from_process_env() -> Result<Self, AppError> {
        let bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| AppError::Config("TELEGRAM_BOT_TOKEN environment variable not set".to_string()))?;

        let config = Self {
            bot_token,
            api_url: var_or("TELEGRAM_API_URL", DEFAULT_API_URL),
            script_path: env::var("SCRIPT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PortablePathManager::script_path()),
            leads_path: env::var("LEADS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PortablePathManager::leads_path()),
            default_interval_ms: parse_var("DEFAULT_INTERVAL_MS", 5_000)?,
            poll_timeout_secs: parse_var("POLL_TIMEOUT_SECS", 25)?,
            log_format: LogFormat::parse(&var_or("LOG_FORMAT", "pretty")),
        };
        config.validate()?;
        Ok(config)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var(key: &str, default: u64) -> Result<u64, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} must be a number: {}", key, e))),
        _ => Ok(default),
    }
}
