use crate::actors::jobs::{Job, JobKind, JobTable};
use crate::actors::messages::{ActorError, AppError, RunOptions, SchedulerMessage};
use crate::actors::traits::{LeadRecorder, Transport};
use crate::engine::continuous::emit_continuously;
use crate::engine::driver::EngineContext;
use crate::engine::state::{RunState, RunStatus, ScriptRunState, Terminal};
use crate::models::{ChatId, Vars};
use crate::pacing::{clamp_interval, effective_delay};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const REPLY_BUFFER: usize = 8;

/// Scheduler-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Continuous-mode interval used when neither the command nor the
    /// conversation supplies one.
    pub default_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 5_000,
        }
    }
}

/// A handle to the `SchedulerActor`.
///
/// This is the entry point for starting, stopping and feeding runs. All
/// operations are serialized through the actor that owns the [`JobTable`], so
/// a cancel-then-replace is never observed half done.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
}

impl SchedulerHandle {
    /// Spawns a scheduler with an empty job table and returns a handle to it.
    pub fn new<T, R>(ctx: EngineContext<T, R>, config: SchedulerConfig) -> Self
    where
        T: Transport,
        R: LeadRecorder,
    {
        Self::with_jobs(ctx, config, JobTable::new())
    }

    /// Spawns a scheduler that owns the given job table.
    pub fn with_jobs<T, R>(ctx: EngineContext<T, R>, config: SchedulerConfig, jobs: JobTable) -> Self
    where
        T: Transport,
        R: LeadRecorder,
    {
        let (sender, receiver) = mpsc::channel(64);
        let runner = SchedulerRunner {
            receiver,
            notifier: sender.downgrade(),
            ctx,
            jobs,
            intervals: HashMap::new(),
            config,
        };
        tokio::spawn(async move { runner.run().await });
        Self { sender }
    }

    async fn request<X>(
        &self,
        build: impl FnOnce(oneshot::Sender<X>) -> SchedulerMessage,
    ) -> Result<X, AppError> {
        let (send, recv) = oneshot::channel();
        self.sender
            .send(build(send))
            .await
            .map_err(|e| ActorError::Unavailable(e.to_string()))?;
        timeout(REQUEST_TIMEOUT, recv)
            .await?
            .map_err(|e| AppError::Actor(ActorError::Unavailable(e.to_string())))
    }

    /// Starts continuous emission, replacing any run. Returns the clamped interval.
    pub async fn start_continuous(
        &self,
        chat_id: ChatId,
        interval_ms: Option<u64>,
    ) -> Result<u64, AppError> {
        self.request(|responder| SchedulerMessage::StartContinuous {
            chat_id,
            interval_ms,
            responder,
        })
        .await?
    }

    /// Sets the conversation's interval. Returns the clamped value.
    pub async fn set_interval(&self, chat_id: ChatId, interval_ms: u64) -> Result<u64, AppError> {
        self.request(|responder| SchedulerMessage::SetInterval {
            chat_id,
            interval_ms,
            responder,
        })
        .await?
    }

    /// Starts a script run, replacing any run. Returns the new run id.
    pub async fn start_script_run(
        &self,
        chat_id: ChatId,
        vars: Vars,
        options: RunOptions,
    ) -> Result<Uuid, AppError> {
        self.request(|responder| SchedulerMessage::StartScript {
            chat_id,
            vars,
            options,
            responder,
        })
        .await?
    }

    /// Cancels the conversation's run. Returns whether one existed.
    pub async fn stop(&self, chat_id: ChatId) -> Result<bool, AppError> {
        self.request(|responder| SchedulerMessage::Stop { chat_id, responder })
            .await
    }

    pub async fn status(&self, chat_id: ChatId) -> Result<Option<RunStatus>, AppError> {
        self.request(|responder| SchedulerMessage::Status { chat_id, responder })
            .await
    }

    /// Routes a user message to the conversation's run. Returns whether it was consumed.
    pub async fn deliver(&self, chat_id: ChatId, text: String) -> Result<bool, AppError> {
        self.request(|responder| SchedulerMessage::Deliver {
            chat_id,
            text,
            responder,
        })
        .await
    }

    /// Cancels every run and stops the actor.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.request(|responder| SchedulerMessage::Shutdown { responder })
            .await
    }
}

// --- Actor Runner ---
struct SchedulerRunner<T, R>
where
    T: Transport,
    R: LeadRecorder,
{
    receiver: mpsc::Receiver<SchedulerMessage>,
    /// Lets run tasks report their own end without keeping the actor alive.
    notifier: mpsc::WeakSender<SchedulerMessage>,
    ctx: EngineContext<T, R>,
    jobs: JobTable,
    /// Preferred continuous interval per conversation (already clamped).
    intervals: HashMap<ChatId, u64>,
    config: SchedulerConfig,
}

impl<T, R> SchedulerRunner<T, R>
where
    T: Transport,
    R: LeadRecorder,
{
    async fn run(mut self) {
        info!("Scheduler started");
        while let Some(msg) = self.receiver.recv().await {
            if !self.handle_message(msg) {
                break;
            }
        }
        self.jobs.clear();
        info!("Scheduler stopped");
    }

    /// Returns `false` once the scheduler should stop.
    fn handle_message(&mut self, msg: SchedulerMessage) -> bool {
        match msg {
            SchedulerMessage::StartContinuous {
                chat_id,
                interval_ms,
                responder,
            } => {
                let _ = responder.send(Ok(self.start_continuous(chat_id, interval_ms)));
            }
            SchedulerMessage::SetInterval {
                chat_id,
                interval_ms,
                responder,
            } => {
                let interval = clamp_interval(interval_ms);
                self.intervals.insert(chat_id, interval);
                let continuous = matches!(
                    self.jobs.get(chat_id).map(|job| &job.kind),
                    Some(JobKind::Continuous { .. })
                );
                if continuous {
                    self.start_continuous(chat_id, Some(interval));
                }
                let _ = responder.send(Ok(interval));
            }
            SchedulerMessage::StartScript {
                chat_id,
                vars,
                options,
                responder,
            } => {
                let _ = responder.send(self.start_script(chat_id, vars, options));
            }
            SchedulerMessage::Stop { chat_id, responder } => {
                let existed = self.jobs.remove(chat_id);
                if existed {
                    info!(chat_id, "Run stopped");
                }
                let _ = responder.send(existed);
            }
            SchedulerMessage::Status { chat_id, responder } => {
                let _ = responder.send(self.jobs.get(chat_id).map(Job::status));
            }
            SchedulerMessage::Deliver {
                chat_id,
                text,
                responder,
            } => {
                let consumed = self
                    .jobs
                    .get(chat_id)
                    .is_some_and(|job| job.offer_reply(text));
                debug!(chat_id, consumed, "Inbound message");
                let _ = responder.send(consumed);
            }
            SchedulerMessage::RunFinished {
                chat_id,
                run_id,
                terminal,
            } => {
                if self.jobs.remove_finished(chat_id, run_id) {
                    info!(chat_id, %run_id, ?terminal, "Run removed");
                }
            }
            SchedulerMessage::Shutdown { responder } => {
                info!("Scheduler shutting down...");
                self.jobs.clear();
                let _ = responder.send(());
                return false;
            }
        }
        true
    }

    #[instrument(skip(self))]
    fn start_continuous(&mut self, chat_id: ChatId, interval_ms: Option<u64>) -> u64 {
        self.jobs.remove(chat_id);

        let interval = clamp_interval(
            interval_ms
                .or_else(|| self.intervals.get(&chat_id).copied())
                .unwrap_or(self.config.default_interval_ms),
        );
        self.intervals.insert(chat_id, interval);

        let run_id = Uuid::new_v4();
        let transport = self.ctx.transport.clone();
        let notifier = self.notifier.clone();
        let task = tokio::spawn(async move {
            let _error = emit_continuously(transport, chat_id, interval).await;
            report_finished(notifier, chat_id, run_id, Terminal::Error).await;
        });
        self.jobs.replace(
            chat_id,
            Job::new(run_id, JobKind::Continuous { interval_ms: interval }, task),
        );
        info!(%run_id, interval, "Continuous run started");
        interval
    }

    #[instrument(skip(self, vars))]
    fn start_script(
        &mut self,
        chat_id: ChatId,
        vars: Vars,
        options: RunOptions,
    ) -> Result<Uuid, AppError> {
        self.jobs.remove(chat_id);

        let script = self.ctx.store.current().inspect_err(|e| {
            warn!("Cannot start script run: {}", e);
        })?;
        let delay = effective_delay(
            script.defaults().delay_ms,
            options.delay_min_ms,
            options.delay_max_ms,
        );

        let state = match ScriptRunState::begin(chat_id, &script, vars, delay) {
            Ok(state) => state,
            Err(notice) => {
                warn!("Script has no start step");
                let ctx = self.ctx.clone();
                tokio::spawn(async move { ctx.notify(chat_id, notice).await });
                return Err(AppError::StepNotFound("script has no start step".to_string()));
            }
        };

        let run_id = Uuid::new_v4();
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);
        let (status_tx, status_rx) = watch::channel(RunState::Script(state.clone()));
        let ctx = self.ctx.clone();
        let notifier = self.notifier.clone();
        let task = tokio::spawn(async move {
            let terminal = ctx.run_script(state, reply_rx, status_tx).await;
            report_finished(notifier, chat_id, run_id, terminal).await;
        });
        self.jobs.replace(
            chat_id,
            Job::new(
                run_id,
                JobKind::Script {
                    replies: reply_tx,
                    state: status_rx,
                },
                task,
            ),
        );
        info!(%run_id, "Script run started");
        Ok(run_id)
    }
}

async fn report_finished(
    notifier: mpsc::WeakSender<SchedulerMessage>,
    chat_id: ChatId,
    run_id: Uuid,
    terminal: Terminal,
) {
    if let Some(sender) = notifier.upgrade() {
        let _ = sender
            .send(SchedulerMessage::RunFinished {
                chat_id,
                run_id,
                terminal,
            })
            .await;
    }
}
