use crate::actors::traits::{LeadRecorder, Transport};
use crate::brain::{render, ReplyClassifier};
use crate::engine::state::{Next, Notice, Reply, RunState, ScriptRunState, Terminal};
use crate::error::AppError;
use crate::models::ChatId;
use crate::pacing::Bounds;
use crate::script::{Script, ScriptStore, Step};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Shared collaborators a script run needs.
pub struct EngineContext<T, R>
where
    T: Transport,
    R: LeadRecorder,
{
    pub transport: Arc<T>,
    pub recorder: Arc<R>,
    pub store: ScriptStore,
    pub classifier: Arc<ReplyClassifier>,
}

impl<T, R> Clone for EngineContext<T, R>
where
    T: Transport,
    R: LeadRecorder,
{
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            recorder: Arc::clone(&self.recorder),
            store: self.store.clone(),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<T, R> EngineContext<T, R>
where
    T: Transport,
    R: LeadRecorder,
{
    /// Drives one script run to completion.
    ///
    /// Each new state is published on `status` before the driver acts on it.
    /// Replies arrive on `replies`; one accepted for an earlier turn is
    /// discarded. The channel closing means the scheduler dropped the run.
    #[instrument(skip_all, fields(chat_id = state.conversation_id))]
    pub async fn run_script(
        &self,
        mut state: ScriptRunState,
        mut replies: mpsc::Receiver<Reply>,
        status: watch::Sender<RunState>,
    ) -> Terminal {
        let chat_id = state.conversation_id;
        let mut finish_after = false;

        loop {
            status.send_replace(RunState::Script(state.clone()));

            let Some(script) = self.current_script(chat_id).await else {
                return Terminal::Error;
            };
            let Some(step) = script.find_step(&state.step_id).cloned() else {
                warn!(step = %state.step_id, "Step not found");
                self.notify(chat_id, Notice::StepNotFound).await;
                return Terminal::Error;
            };

            info!(step = %step.id, "Emitting step");
            if let Err(e) = self
                .emit_step(chat_id, &step, &state, script.defaults().jitter_ms)
                .await
            {
                error!(step = %step.id, "Emission failed: {}", e);
                self.notify(chat_id, Notice::Failure).await;
                return Terminal::Error;
            }

            let (next_state, finished) = state.after_emission(step.expect.as_ref(), finish_after);
            state = next_state;
            if let Some((terminal, notice)) = finished {
                self.notify(chat_id, notice).await;
                info!(?terminal, "Script run finished");
                return terminal;
            }
            status.send_replace(RunState::Script(state.clone()));

            loop {
                let Some(Reply { turn, text }) = replies.recv().await else {
                    debug!("Reply channel closed");
                    return Terminal::Cancelled;
                };
                if turn != state.turn {
                    debug!(turn, current = state.turn, "Dropping reply from an answered turn");
                    continue;
                }
                let Some(script) = self.current_script(chat_id).await else {
                    return Terminal::Error;
                };

                let transition = state.on_reply(&text, &script, &self.classifier, Utc::now());
                state = transition.state;
                if let Some(lead) = transition.lead {
                    if let Err(e) = self.recorder.upsert(&lead).await {
                        error!(contact = %lead.contact, "Failed to record lead: {}", e);
                    } else {
                        info!("Lead recorded");
                    }
                }

                match transition.next {
                    Next::Ignore => continue,
                    Next::Emit { finish_after: f } => {
                        finish_after = f;
                        break;
                    }
                    Next::Finish { terminal, notice } => {
                        if terminal == Terminal::Error {
                            warn!(step = %state.step_id, "Branch target not found");
                        }
                        self.notify(chat_id, notice).await;
                        info!(?terminal, "Script run finished");
                        return terminal;
                    }
                }
            }
        }
    }

    /// The loaded script. Notifies the conversation when there is none.
    async fn current_script(&self, chat_id: ChatId) -> Option<Arc<Script>> {
        match self.store.current() {
            Ok(script) => Some(script),
            Err(e) => {
                error!("No script to run: {}", e);
                self.notify(chat_id, Notice::Failure).await;
                None
            }
        }
    }

    async fn emit_step(
        &self,
        chat_id: ChatId,
        step: &Step,
        state: &ScriptRunState,
        jitter: Bounds,
    ) -> Result<(), AppError> {
        for template in &step.messages {
            sleep(jitter.random_duration()).await;
            let text = render(template, &state.vars);
            if !text.is_empty() {
                self.transport.send_message(chat_id, &text).await?;
            }
            sleep(state.delay.random_duration()).await;
        }
        Ok(())
    }

    /// Best effort: the conversation may be the very thing that is unreachable.
    pub async fn notify(&self, chat_id: ChatId, notice: Notice) {
        if let Err(e) = self.transport.send_message(chat_id, notice.text()).await {
            warn!(chat_id, ?notice, "Failed to deliver notice: {}", e);
        }
    }
}
