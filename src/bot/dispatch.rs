//! Per-user ordered dispatch.
//!
//! Each user gets one worker task fed by an unbounded queue, so a user's
//! events are handled one at a time in arrival order while different users
//! proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::channels::InboundEvent;

use super::TurnOrchestrator;

pub(crate) struct UserQueues {
    bot: Arc<TurnOrchestrator>,
    senders: HashMap<String, mpsc::UnboundedSender<InboundEvent>>,
    workers: JoinSet<()>,
}

impl UserQueues {
    pub(crate) fn new(bot: Arc<TurnOrchestrator>) -> Self {
        Self {
            bot,
            senders: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    /// Queue `event` behind the user's earlier events.
    pub(crate) fn dispatch(&mut self, event: InboundEvent) {
        let event = match self.senders.get(&event.user_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker is gone (it panicked); start a new one.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let user_id = event.user_id.clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        let bot = Arc::clone(&self.bot);
        self.workers.spawn(async move {
            while let Some(event) = rx.recv().await {
                bot.handle_event(event).await;
            }
        });
        debug!(user_id = %user_id, "Started user worker");

        if tx.send(event).is_err() {
            warn!(user_id = %user_id, "User worker exited before its first event");
        }
        self.senders.insert(user_id, tx);
    }

    /// Close every queue and wait for the queued events to be handled.
    pub(crate) async fn drain(mut self) {
        self.senders.clear();
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "User worker failed");
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::bot::BotDeps;
    use crate::channels::{BotCommand, Keyboard, Messenger};
    use crate::config::{FollowupConfig, LinkConfig, MemoryConfig};
    use crate::engine::ChatEngine;
    use crate::error::{ChannelError, LlmError};
    use crate::memory::{ChatMemory, ConversationMemoryStore};
    use crate::store::LibSqlBackend;

    struct Silent;

    #[async_trait]
    impl ChatEngine for Silent {
        async fn respond(
            &self,
            _memory: &mut ChatMemory,
            _system_prompt: &str,
            message: &str,
        ) -> Result<String, LlmError> {
            Ok(message.to_string())
        }
    }

    #[derive(Default)]
    struct Sink {
        texts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Messenger for Sink {
        async fn send_text(
            &self,
            chat_id: &str,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), ChannelError> {
            self.texts
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn send_document(&self, _chat_id: &str, _path: &Path) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn set_commands(&self, _commands: &[BotCommand]) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    async fn bot(sink: Arc<Sink>) -> Arc<TurnOrchestrator> {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        Arc::new(TurnOrchestrator::new(BotDeps {
            memory: Arc::new(ConversationMemoryStore::new(db, MemoryConfig::default())),
            engine: Arc::new(Silent),
            messenger: sink,
            links: LinkConfig {
                booking_url: "https://calendly.com/youmatch".into(),
                concierge_url: "https://t.me/concierge".into(),
                founder_interview_url: LinkConfig::DEFAULT_FOUNDER_INTERVIEW_URL.into(),
            },
            guide_path: PathBuf::from("/nonexistent/guide.pdf"),
            followup: FollowupConfig::default(),
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_worker_per_user_in_arrival_order() {
        let sink = Arc::new(Sink::default());
        let mut queues = UserQueues::new(bot(sink.clone()).await);

        for i in 0..20 {
            queues.dispatch(InboundEvent::text("a", "a", format!("a{i}")));
            queues.dispatch(InboundEvent::text("b", "b", format!("b{i}")));
        }
        assert_eq!(queues.len(), 2);
        queues.drain().await;

        let texts = sink.texts.lock().unwrap().clone();
        for user in ["a", "b"] {
            let replies: Vec<String> = texts
                .iter()
                .filter(|(chat, _)| chat == user)
                .map(|(_, text)| text.clone())
                .collect();
            let expected: Vec<String> = (0..20).map(|i| format!("{user}{i}")).collect();
            assert_eq!(replies, expected);
        }
    }
}
