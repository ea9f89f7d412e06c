//! Script run state and its transition functions.
//!
//! Everything here is pure: each function consumes the current
//! [`ScriptRunState`] and returns its replacement together with what the
//! driver should do next. Sleeping, sending and recording live in
//! [`crate::engine::driver`].

use crate::brain::{Intent, ReplyClassifier};
use crate::models::{ChatId, LeadRecord, Vars};
use crate::pacing::Bounds;
use crate::script::{Expect, Script};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Short user-facing notices. Raw error details never reach the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    ScriptNotFound,
    StepNotFound,
    Completed,
    Declined,
    Failure,
}

impl Notice {
    pub fn text(&self) -> &'static str {
        match self {
            Notice::ScriptNotFound => "Скрипт не найден.",
            Notice::StepNotFound => "Шаг скрипта не найден, диалог остановлен.",
            Notice::Completed => "Скрипт завершён.",
            Notice::Declined => "Понял, спасибо за ответ! Хорошего дня.",
            Notice::Failure => "Что-то пошло не так, диалог остановлен.",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Done,
    Error,
    /// The scheduler dropped the run (stop or replacement).
    Cancelled,
}

/// Observable phase of a live script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Emitting,
    AwaitingResponse,
}

/// State of one script run. Replaced, never mutated, on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRunState {
    pub conversation_id: ChatId,
    pub step_id: String,
    pub vars: Vars,
    pub delay: Bounds,
    pub awaiting: Option<Expect>,
    /// Incremented every time the run starts awaiting a reply. A reply is
    /// only valid for the turn it was accepted in.
    pub turn: u64,
}

/// A user reply accepted for a specific awaiting turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub turn: u64,
    pub text: String,
}

/// What the driver does after a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// The reply did not concern this run.
    Ignore,
    /// Emit the (new) current step. With `finish_after`, the run completes
    /// once emission ends even if the step declares an `expect`.
    Emit { finish_after: bool },
    /// Send `notice` and end the run.
    Finish { terminal: Terminal, notice: Notice },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ScriptRunState,
    pub lead: Option<LeadRecord>,
    pub next: Next,
}

impl ScriptRunState {
    /// Resolves the start step. Fails with the notice to send when the script has none.
    pub fn begin(
        conversation_id: ChatId,
        script: &Script,
        vars: Vars,
        delay: Bounds,
    ) -> Result<Self, Notice> {
        let start = script.start_step().ok_or(Notice::ScriptNotFound)?;
        Ok(Self {
            conversation_id,
            step_id: start.id.clone(),
            vars,
            delay: delay.clamped(),
            awaiting: None,
            turn: 0,
        })
    }

    pub fn phase(&self) -> Phase {
        if self.awaiting.is_some() {
            Phase::AwaitingResponse
        } else {
            Phase::Emitting
        }
    }

    /// Called once the current step's messages are out.
    ///
    /// Returns the awaiting state, or the state plus the terminal notice when
    /// the run is over.
    pub fn after_emission(
        self,
        expect: Option<&Expect>,
        finish_after: bool,
    ) -> (Self, Option<(Terminal, Notice)>) {
        match expect {
            Some(expect) if !finish_after => (
                Self {
                    awaiting: Some(expect.clone()),
                    turn: self.turn + 1,
                    ..self
                },
                None,
            ),
            _ => (
                Self {
                    awaiting: None,
                    ..self
                },
                Some((Terminal::Done, Notice::Completed)),
            ),
        }
    }

    /// Applies a user reply.
    pub fn on_reply(
        self,
        text: &str,
        script: &Script,
        classifier: &ReplyClassifier,
        now: DateTime<Utc>,
    ) -> Transition {
        let Some(expect) = self.awaiting.clone() else {
            return Transition {
                state: self,
                lead: None,
                next: Next::Ignore,
            };
        };

        match expect {
            Expect::YesNo { yes, no } => match (classifier.classify(text), no) {
                (Intent::Yes, _) => self.route(&yes, script, None, false),
                (Intent::No, Some(no)) => self.route(&no, script, None, false),
                _ => Transition {
                    state: Self {
                        awaiting: None,
                        ..self
                    },
                    lead: None,
                    next: Next::Finish {
                        terminal: Terminal::Done,
                        notice: Notice::Declined,
                    },
                },
            },
            Expect::FreeText { next } => {
                let contact = text.trim();
                let lead = (!contact.is_empty()).then(|| {
                    LeadRecord::from_vars(self.conversation_id, contact.to_string(), &self.vars, now)
                });
                self.route(&next, script, lead, true)
            }
        }
    }

    fn route(
        self,
        target: &str,
        script: &Script,
        lead: Option<LeadRecord>,
        finish_after: bool,
    ) -> Transition {
        if script.find_step(target).is_none() {
            return Transition {
                state: Self {
                    awaiting: None,
                    ..self
                },
                lead,
                next: Next::Finish {
                    terminal: Terminal::Error,
                    notice: Notice::StepNotFound,
                },
            };
        }
        Transition {
            state: Self {
                step_id: target.to_string(),
                awaiting: None,
                ..self
            },
            lead,
            next: Next::Emit { finish_after },
        }
    }
}

/// Public view of a conversation's run, as kept in the job table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunState {
    Continuous { interval_ms: u64 },
    Script(ScriptRunState),
}

/// Operator-facing status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
}

impl RunStatus {
    /// One-line description for chat replies.
    pub fn describe(&self) -> String {
        match &self.state {
            RunState::Continuous { interval_ms } => {
                format!("continuous mode, every {} ms", interval_ms)
            }
            RunState::Script(s) => match s.phase() {
                Phase::Emitting => format!("script run, emitting step '{}'", s.step_id),
                Phase::AwaitingResponse => {
                    format!("script run, step '{}' awaiting a reply", s.step_id)
                }
            },
        }
    }
}
