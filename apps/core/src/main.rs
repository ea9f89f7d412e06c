// Sales bot entry point: Telegram polling -> operator commands / scheduler.

use salesbot_core::actors::scheduler::{SchedulerConfig, SchedulerHandle};
use salesbot_core::actors::traits::Transport;
use salesbot_core::brain::ReplyClassifier;
use salesbot_core::commands;
use salesbot_core::config::AppConfig;
use salesbot_core::engine::EngineContext;
use salesbot_core::fs_manager::PortablePathManager;
use salesbot_core::script::ScriptStore;
use salesbot_core::sheet::CsvSheetRecorder;
use salesbot_core::telegram::{Inbound, TelegramTransport};
use salesbot_core::telemetry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct App {
    scheduler: SchedulerHandle,
    store: ScriptStore,
    transport: Arc<TelegramTransport>,
    recorder: Arc<CsvSheetRecorder>,
}

impl App {
    async fn handle_inbound(&self, inbound: Inbound) {
        let Inbound {
            chat_id,
            text,
            sender_name,
        } = inbound;
        debug!(chat_id, sender = ?sender_name, "Inbound message");

        let reply = match commands::parse(&text) {
            Some(Ok(command)) => Some(
                commands::execute(
                    command,
                    chat_id,
                    &self.scheduler,
                    &self.store,
                    self.recorder.as_ref(),
                )
                .await,
            ),
            Some(Err(e)) => Some(e.to_string()),
            None => {
                match self.scheduler.deliver(chat_id, text).await {
                    Ok(consumed) => debug!(chat_id, consumed, "Reply routed"),
                    Err(e) => error!(chat_id, "Failed to route reply: {}", e),
                }
                None
            }
        };

        if let Some(reply) = reply {
            if let Err(e) = self.transport.send_message(chat_id, &reply).await {
                warn!(chat_id, "Failed to answer operator: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    telemetry::init("salesbot", config.log_format);

    if let Err(e) = PortablePathManager::init() {
        error!("Failed to initialize data directory: {}", e);
    }

    let store = ScriptStore::new(&config.script_path);
    if let Err(e) = store.load().await {
        // Not fatal: /reload can fix it without a restart
        error!("Script not loaded at startup: {}", e);
    }

    let transport = Arc::new(TelegramTransport::new(&config.api_url, &config.bot_token)?);
    let recorder = Arc::new(CsvSheetRecorder::new(&config.leads_path));
    let ctx = EngineContext {
        transport: Arc::clone(&transport),
        recorder: Arc::clone(&recorder),
        store: store.clone(),
        classifier: Arc::new(ReplyClassifier::new()),
    };
    let scheduler = SchedulerHandle::new(
        ctx,
        SchedulerConfig {
            default_interval_ms: config.default_interval_ms,
        },
    );

    let (inbound_tx, mut inbound_rx) = mpsc::channel(256);
    let poller = {
        let transport = Arc::clone(&transport);
        let timeout = config.poll_timeout_secs;
        tokio::spawn(async move { transport.poll(timeout, inbound_tx).await })
    };

    let app = App {
        scheduler,
        store,
        transport,
        recorder,
    };
    info!(script = %config.script_path.display(), leads = %config.leads_path.display(), "Sales bot running");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(inbound) = inbound_rx.recv() => app.handle_inbound(inbound).await,
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            else => break,
        }
    }

    poller.abort();
    if let Err(e) = app.scheduler.shutdown().await {
        warn!("Scheduler shutdown failed: {}", e);
    }
    Ok(())
}
