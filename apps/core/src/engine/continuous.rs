use crate::actors::traits::Transport;
use crate::error::AppError;
use crate::models::ChatId;
use crate::pacing::{clamp_interval, CONTINUOUS_JITTER};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Words emitted by continuous mode, one per tick.
pub const WORDS: &[&str] = &[
    "привет",
    "как дела",
    "тест",
    "связь",
    "проверка",
    "сообщение",
    "бот",
    "пинг",
    "окей",
    "работаю",
];

/// Emits a random word every `interval_ms` (plus jitter) until a send fails.
///
/// Never returns on its own while the transport keeps accepting messages;
/// the scheduler ends it by aborting the task. Returns the send error otherwise.
#[instrument(skip(transport))]
pub async fn emit_continuously<T: Transport>(
    transport: Arc<T>,
    chat_id: ChatId,
    interval_ms: u64,
) -> AppError {
    let interval = Duration::from_millis(clamp_interval(interval_ms));
    loop {
        sleep(interval).await;
        sleep(CONTINUOUS_JITTER.random_duration()).await;

        let word = WORDS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("ping");
        debug!(word, "Continuous tick");
        if let Err(e) = transport.send_message(chat_id, word).await {
            warn!("Continuous emission stopped: {}", e);
            return e;
        }
    }
}
