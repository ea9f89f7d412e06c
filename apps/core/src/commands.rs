//! Operator chat commands.
//!
//! Messages starting with `/` are parsed into a [`Command`] and executed
//! against the scheduler, the script store or the recorder. Every other
//! message is a user reply and goes to the scheduler instead.

use crate::actors::messages::RunOptions;
use crate::actors::scheduler::SchedulerHandle;
use crate::actors::traits::LeadRecorder;
use crate::error::AppError;
use crate::models::{ChatId, LeadRecord, Vars, DEFAULT_AGENT_NAME};
use crate::script::ScriptStore;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

pub const HELP: &str = "Commands:\n\
/spam_start [ms] - start continuous mode\n\
/stop - stop any run\n\
/interval <ms> - set continuous interval (2000-60000)\n\
/status - show the current run\n\
/run key=value ... - start the script (delay_min=, delay_max= override pacing)\n\
/script - show the loaded script\n\
/reload - reload the script file\n\
/sheet_test - write a test row to the lead sheet";

/// Conversation id of the `/sheet_test` row. Telegram never assigns 0, so the
/// row cannot replace a real lead.
pub const SHEET_TEST_CONVERSATION: ChatId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SpamStart { interval_ms: Option<u64> },
    Stop,
    Interval { interval_ms: u64 },
    Status,
    Run { vars: Vars, options: RunOptions },
    ShowScript,
    Reload,
    SheetTest,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: /{0}")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parses an operator command. Returns `None` when `text` is not a command at all.
pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
    let text = text.trim();
    let body = text.strip_prefix('/')?;
    let (head, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    // Group chats append the bot name: /status@my_bot
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let rest = rest.trim();

    let command = match name.as_str() {
        "spam_start" | "start_spam" => match rest {
            "" => Ok(Command::SpamStart { interval_ms: None }),
            ms => ms
                .parse()
                .map(|ms| Command::SpamStart { interval_ms: Some(ms) })
                .map_err(|_| CommandError::Usage("/spam_start [ms]")),
        },
        "stop" | "spam_stop" | "stop_spam" => Ok(Command::Stop),
        "interval" => rest
            .parse()
            .map(|interval_ms| Command::Interval { interval_ms })
            .map_err(|_| CommandError::Usage("/interval <ms>")),
        "status" => Ok(Command::Status),
        "run" | "run_script" => parse_run(rest),
        "script" | "show_script" => Ok(Command::ShowScript),
        "reload" => Ok(Command::Reload),
        "sheet_test" => Ok(Command::SheetTest),
        "help" | "start" => Ok(Command::Help),
        other => Err(CommandError::Unknown(other.to_string())),
    };
    Some(command)
}

fn parse_run(args: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/run key=value ... (quote values with spaces)";
    let mut vars = Vars::new();
    let mut options = RunOptions::default();

    for token in tokenize(args).ok_or(CommandError::Usage(USAGE))? {
        let (key, value) = token.split_once('=').ok_or(CommandError::Usage(USAGE))?;
        if key.is_empty() {
            return Err(CommandError::Usage(USAGE));
        }
        match key {
            "delay_min" => {
                options.delay_min_ms = Some(value.parse().map_err(|_| CommandError::Usage(USAGE))?);
            }
            "delay_max" => {
                options.delay_max_ms = Some(value.parse().map_err(|_| CommandError::Usage(USAGE))?);
            }
            _ => {
                vars.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(Command::Run { vars, options })
}

/// Splits on whitespace, keeping double-quoted sections together. `None` on an unclosed quote.
fn tokenize(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return None;
    }
    if has_token {
        tokens.push(current);
    }
    Some(tokens)
}

/// Runs a parsed command and returns the reply for the operator.
pub async fn execute<R: LeadRecorder>(
    command: Command,
    chat_id: ChatId,
    scheduler: &SchedulerHandle,
    store: &ScriptStore,
    recorder: &R,
) -> String {
    match run_command(command, chat_id, scheduler, store, recorder).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(chat_id, "Command failed: {}", e);
            match e {
                AppError::ScriptLoad(_) => "Скрипт не загружен, проверьте файл и выполните /reload.".to_string(),
                _ => "Команда не выполнена, подробности в логах.".to_string(),
            }
        }
    }
}

async fn run_command<R: LeadRecorder>(
    command: Command,
    chat_id: ChatId,
    scheduler: &SchedulerHandle,
    store: &ScriptStore,
    recorder: &R,
) -> Result<String, AppError> {
    info!(chat_id, ?command, "Operator command");
    let reply = match command {
        Command::SpamStart { interval_ms } => {
            let interval = scheduler.start_continuous(chat_id, interval_ms).await?;
            format!("Continuous mode started, every {} ms.", interval)
        }
        Command::Stop => {
            if scheduler.stop(chat_id).await? {
                "Stopped.".to_string()
            } else {
                "Nothing is running.".to_string()
            }
        }
        Command::Interval { interval_ms } => {
            let interval = scheduler.set_interval(chat_id, interval_ms).await?;
            format!("Interval set to {} ms.", interval)
        }
        Command::Status => match scheduler.status(chat_id).await? {
            Some(status) => format!("Active: {}.", status.describe()),
            None => "No active run.".to_string(),
        },
        Command::Run { vars, options } => {
            scheduler.start_script_run(chat_id, vars, options).await?;
            "Script started.".to_string()
        }
        Command::ShowScript => store.current()?.summary(),
        Command::Reload => {
            let script = store.load().await?;
            format!("Script reloaded: {} steps.", script.steps().len())
        }
        Command::SheetTest => {
            let record = LeadRecord {
                timestamp: Utc::now(),
                client_name: "Test client".to_string(),
                contact: "test".to_string(),
                conversation_id: SHEET_TEST_CONVERSATION,
                status: "test".to_string(),
                agent: DEFAULT_AGENT_NAME.to_string(),
            };
            recorder.upsert(&record).await?;
            "Test row written.".to_string()
        }
        Command::Help => HELP.to_string(),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse("да"), None);
        assert_eq!(parse("  hello /status"), None);
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("/status"), Some(Ok(Command::Status)));
        assert_eq!(parse("/status@sales_bot"), Some(Ok(Command::Status)));
        assert_eq!(parse("/STOP"), Some(Ok(Command::Stop)));
        assert_eq!(parse("/script"), Some(Ok(Command::ShowScript)));
        assert_eq!(parse("/sheet_test"), Some(Ok(Command::SheetTest)));
        assert_eq!(
            parse("/spam_start"),
            Some(Ok(Command::SpamStart { interval_ms: None }))
        );
        assert_eq!(
            parse("/spam_start 3000"),
            Some(Ok(Command::SpamStart {
                interval_ms: Some(3000)
            }))
        );
        assert_eq!(
            parse("/interval 1500"),
            Some(Ok(Command::Interval { interval_ms: 1500 }))
        );
    }

    #[test]
    fn test_bad_arguments_report_usage() {
        assert_eq!(
            parse("/interval soon"),
            Some(Err(CommandError::Usage("/interval <ms>")))
        );
        assert!(matches!(parse("/run broken"), Some(Err(CommandError::Usage(_)))));
        assert!(matches!(parse("/run a=\"open"), Some(Err(CommandError::Usage(_)))));
        assert_eq!(
            parse("/dance"),
            Some(Err(CommandError::Unknown("dance".to_string())))
        );
    }

    #[test]
    fn test_run_parses_vars_and_options() {
        let Some(Ok(Command::Run { vars, options })) =
            parse(r#"/run client_name="Анна Ли" my_name=Никита delay_min=100 delay_max=900"#)
        else {
            panic!("expected a run command");
        };
        assert_eq!(vars.get("client_name").map(String::as_str), Some("Анна Ли"));
        assert_eq!(vars.get("my_name").map(String::as_str), Some("Никита"));
        assert!(!vars.contains_key("delay_min"));
        assert_eq!(
            options,
            RunOptions {
                delay_min_ms: Some(100),
                delay_max_ms: Some(900)
            }
        );
    }

    #[test]
    fn test_run_without_args() {
        assert_eq!(
            parse("/run"),
            Some(Ok(Command::Run {
                vars: Vars::new(),
                options: RunOptions::default()
            }))
        );
    }
}
