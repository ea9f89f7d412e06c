//! Shared mocks and fixtures.

use crate::actors::scheduler::{SchedulerConfig, SchedulerHandle};
use crate::actors::traits::{LeadRecorder, Transport};
use crate::brain::ReplyClassifier;
use crate::engine::driver::EngineContext;
use crate::engine::state::{RunState, ScriptRunState};
use crate::error::AppError;
use crate::models::{ChatId, LeadRecord, Vars};
use crate::script::{Script, ScriptStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

/// Upper bound on any single wait. Generous so paused-clock tests can skip
/// over long script delays.
const WAIT_LIMIT: Duration = Duration::from_secs(30);
const POLL_EVERY: Duration = Duration::from_millis(10);
const POLL_ROUNDS: u32 = 3_000;

/// Harness stores are seeded in memory; this path never exists.
pub const UNUSED_PATH: &str = "no-such-dir/script.json";

// ============================================================================
// Mock Collaborators
// ============================================================================

/// Transport that forwards every successful send to a channel.
pub struct MockTransport {
    sent: mpsc::UnboundedSender<(ChatId, String)>,
    failing: AtomicBool,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(ChatId, String)>) {
        let (sent, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            sent,
            failing: AtomicBool::new(false),
        });
        (transport, rx)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Transport {
                code: Some(403),
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        let _ = self.sent.send((chat_id, text.to_string()));
        Ok(())
    }
}

/// Recorder that keeps every upserted lead in memory.
#[derive(Default)]
pub struct MockRecorder {
    pub records: Mutex<Vec<LeadRecord>>,
    pub should_fail: bool,
}

impl MockRecorder {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    pub fn recorded(&self) -> Vec<LeadRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadRecorder for MockRecorder {
    async fn upsert(&self, record: &LeadRecord) -> Result<(), AppError> {
        self.records.lock().unwrap().push(record.clone());
        if self.should_fail {
            Err(AppError::Recorder("Mock sheet unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Zero pacing so runs complete as fast as the runtime allows.
pub const INSTANT_DEFAULTS: &str =
    r#""defaults": { "jitterMs": { "min": 0, "max": 0 }, "delayMs": { "min": 0, "max": 0 } }"#;

/// Builds a script from a JSON `steps` array with zero pacing.
pub fn script(steps_json: &str) -> Script {
    Script::from_json(&format!(r#"{{ {}, "steps": {} }}"#, INSTANT_DEFAULTS, steps_json))
        .expect("fixture script must be valid")
}

/// S1 asks a yes/no question, S2 says goodbye.
pub fn yes_no_script() -> Script {
    script(
        r#"[
            { "id": "S1", "on": "start", "messages": ["Hello {{name}}"], "expect": { "type": "yes_no", "yes": "S2" } },
            { "id": "S2", "messages": ["Bye"] }
        ]"#,
    )
}

pub fn vars(pairs: &[(&str, &str)]) -> Vars {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub struct Harness {
    pub scheduler: SchedulerHandle,
    pub transport: Arc<MockTransport>,
    pub recorder: Arc<MockRecorder>,
    pub store: ScriptStore,
    pub sent: mpsc::UnboundedReceiver<(ChatId, String)>,
}

impl Harness {
    pub fn new(script: Option<Script>) -> Self {
        Self::with_recorder(script, MockRecorder::default())
    }

    pub fn with_recorder(script: Option<Script>, recorder: MockRecorder) -> Self {
        let (transport, sent) = MockTransport::new();
        let recorder = Arc::new(recorder);
        let store = match script {
            Some(script) => ScriptStore::with_script(UNUSED_PATH, script),
            None => ScriptStore::new(UNUSED_PATH),
        };
        let ctx = EngineContext {
            transport: Arc::clone(&transport),
            recorder: Arc::clone(&recorder),
            store: store.clone(),
            classifier: Arc::new(ReplyClassifier::new()),
        };
        let scheduler = SchedulerHandle::new(ctx, SchedulerConfig::default());
        Self {
            scheduler,
            transport,
            recorder,
            store,
            sent,
        }
    }

    /// Next message sent to any conversation.
    pub async fn next_sent(&mut self) -> (ChatId, String) {
        timeout(WAIT_LIMIT, self.sent.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("transport channel closed")
    }

    /// Next message text, asserting it went to `chat_id`.
    pub async fn next_text(&mut self, chat_id: ChatId) -> String {
        let (to, text) = self.next_sent().await;
        assert_eq!(to, chat_id, "message {:?} went to the wrong chat", text);
        text
    }

    /// Waits until the conversation's script run is awaiting a reply.
    pub async fn wait_awaiting(&self, chat_id: ChatId) {
        self.wait_state(chat_id, |s| s.awaiting.is_some()).await;
    }

    /// Waits until the script run is awaiting a reply at `step_id`.
    pub async fn wait_awaiting_at(&self, chat_id: ChatId, step_id: &str) {
        self.wait_state(chat_id, |s| s.awaiting.is_some() && s.step_id == step_id)
            .await;
    }

    async fn wait_state(&self, chat_id: ChatId, done: impl Fn(&ScriptRunState) -> bool) {
        for _ in 0..POLL_ROUNDS {
            if let Some(status) = self.scheduler.status(chat_id).await.unwrap() {
                if matches!(&status.state, RunState::Script(s) if done(s)) {
                    return;
                }
            }
            sleep(POLL_EVERY).await;
        }
        panic!("run for chat {} never reached the expected state", chat_id);
    }

    /// Waits until the conversation has no run left.
    pub async fn wait_removed(&self, chat_id: ChatId) {
        for _ in 0..POLL_ROUNDS {
            if self.scheduler.status(chat_id).await.unwrap().is_none() {
                return;
            }
            sleep(POLL_EVERY).await;
        }
        panic!("run for chat {} was never removed", chat_id);
    }
}
