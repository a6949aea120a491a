//! Two-stage follow-up reminders after questionnaire completion.
//!
//! Each run is a cancellable task registered under the user id together
//! with its "responded" flag. The entry is removed when the run ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::{CallbackAction, InlineButton, Keyboard, Messenger};
use crate::config::FollowupConfig;
use crate::prompts;

/// How a follow-up run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowupOutcome {
    /// The user responded before reminder A was due.
    SuppressedBeforeFirst,
    /// Reminder A was sent; the user responded before reminder B.
    SuppressedAfterFirst,
    /// Both reminders were sent.
    Finished,
    /// Cancelled or replaced by a newer run.
    Cancelled,
}

#[derive(Clone)]
struct FollowupRun {
    id: Uuid,
    responded: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl FollowupRun {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            responded: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }
}

/// Schedules and tracks per-user follow-up runs.
pub struct FollowupScheduler {
    messenger: Arc<dyn Messenger>,
    config: FollowupConfig,
    booking_url: String,
    runs: Arc<DashMap<String, FollowupRun>>,
}

impl FollowupScheduler {
    pub fn new(messenger: Arc<dyn Messenger>, config: FollowupConfig, booking_url: String) -> Self {
        Self {
            messenger,
            config,
            booking_url,
            runs: Arc::new(DashMap::new()),
        }
    }

    /// Start a run for `user_id`, replacing any run already in progress.
    pub fn start(&self, user_id: &str, chat_id: &str) -> JoinHandle<FollowupOutcome> {
        let run = FollowupRun::new();
        if let Some(previous) = self.runs.insert(user_id.to_string(), run.clone()) {
            previous.cancel.cancel();
            debug!(user_id, "Replaced earlier follow-up run");
        }
        info!(user_id, "Follow-up scheduled");

        let ctx = RunContext {
            messenger: Arc::clone(&self.messenger),
            config: self.config.clone(),
            booking_url: self.booking_url.clone(),
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
        };
        let runs = Arc::clone(&self.runs);

        tokio::spawn(async move {
            let outcome = ctx.run(&run).await;
            runs.remove_if(&ctx.user_id, |_, current| current.id == run.id);
            debug!(user_id = %ctx.user_id, ?outcome, "Follow-up run ended");
            outcome
        })
    }

    /// Record that the user responded. No-op when no run is active.
    pub fn mark_responded(&self, user_id: &str) -> bool {
        match self.runs.get(user_id) {
            Some(run) => {
                run.responded.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Abort the user's run. Returns whether one was active.
    pub fn cancel(&self, user_id: &str) -> bool {
        match self.runs.remove(user_id) {
            Some((_, run)) => {
                run.cancel.cancel();
                debug!(user_id, "Follow-up cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, user_id: &str) -> bool {
        self.runs.contains_key(user_id)
    }
}

struct RunContext {
    messenger: Arc<dyn Messenger>,
    config: FollowupConfig,
    booking_url: String,
    user_id: String,
    chat_id: String,
}

impl RunContext {
    async fn run(&self, run: &FollowupRun) -> FollowupOutcome {
        if !wait(&run.cancel, self.config.first_delay).await {
            return FollowupOutcome::Cancelled;
        }
        if run.responded.load(Ordering::SeqCst) {
            return FollowupOutcome::SuppressedBeforeFirst;
        }
        let keyboard: Keyboard = vec![vec![
            InlineButton::callback(prompts::BUTTON_YES, CallbackAction::FollowupYes),
            InlineButton::callback(prompts::BUTTON_NO, CallbackAction::FollowupNo),
        ]];
        self.deliver("first", prompts::FOLLOWUP_FIRST, &keyboard).await;

        if !wait(&run.cancel, self.config.second_delay).await {
            return FollowupOutcome::Cancelled;
        }
        if run.responded.load(Ordering::SeqCst) {
            return FollowupOutcome::SuppressedAfterFirst;
        }
        let keyboard: Keyboard = vec![vec![InlineButton::url(
            prompts::BUTTON_PERSONAL_REVIEW_YES,
            &self.booking_url,
        )]];
        self.deliver("second", prompts::FOLLOWUP_SECOND, &keyboard).await;

        FollowupOutcome::Finished
    }

    /// A failed delivery is logged and does not stop the run.
    async fn deliver(&self, stage: &str, text: &str, keyboard: &Keyboard) {
        match self
            .messenger
            .send_text(&self.chat_id, text, Some(keyboard))
            .await
        {
            Ok(()) => info!(user_id = %self.user_id, stage, "Follow-up reminder sent"),
            Err(e) => warn!(
                user_id = %self.user_id,
                stage,
                error = %e,
                "Failed to send follow-up reminder"
            ),
        }
    }
}

/// Sleep for `delay`. Returns false if cancelled first.
async fn wait(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::channels::BotCommand;
    use crate::error::ChannelError;

    const T1: Duration = Duration::from_secs(3600);
    const T2: Duration = Duration::from_secs(6 * 3600);

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_text(
            &self,
            _chat_id: &str,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(ChannelError::SendFailed {
                    name: "test".into(),
                    reason: "offline".into(),
                });
            }
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

    fn scheduler(messenger: Arc<RecordingMessenger>) -> FollowupScheduler {
        FollowupScheduler::new(
            messenger,
            FollowupConfig {
                first_delay: T1,
                second_delay: T2,
            },
            "https://calendly.com/youmatch".into(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn responded_before_first_sends_nothing() {
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = scheduler(messenger.clone());

        let handle = scheduler.start("u", "c");
        assert!(scheduler.mark_responded("u"));

        assert_eq!(handle.await.unwrap(), FollowupOutcome::SuppressedBeforeFirst);
        assert!(messenger.sent.lock().unwrap().is_empty());
        assert!(!scheduler.is_scheduled("u"));
    }

    #[tokio::test(start_paused = true)]
    async fn responded_between_sends_only_first() {
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = scheduler(messenger.clone());

        let handle = scheduler.start("u", "c");
        tokio::time::sleep(T1 + Duration::from_secs(1)).await;
        assert_eq!(messenger.sent.lock().unwrap().len(), 1);
        scheduler.mark_responded("u");

        assert_eq!(handle.await.unwrap(), FollowupOutcome::SuppressedAfterFirst);
        assert_eq!(*messenger.sent.lock().unwrap(), vec![prompts::FOLLOWUP_FIRST]);
    }

    #[tokio::test(start_paused = true)]
    async fn never_responded_sends_both() {
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = scheduler(messenger.clone());

        let outcome = scheduler.start("u", "c").await.unwrap();
        assert_eq!(outcome, FollowupOutcome::Finished);
        assert_eq!(
            *messenger.sent.lock().unwrap(),
            vec![prompts::FOLLOWUP_FIRST, prompts::FOLLOWUP_SECOND]
        );
        assert!(!scheduler.is_scheduled("u"));
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_failure_does_not_abort() {
        let messenger = Arc::new(RecordingMessenger {
            fail: true,
            ..Default::default()
        });
        let scheduler = scheduler(messenger.clone());

        let outcome = scheduler.start("u", "c").await.unwrap();
        assert_eq!(outcome, FollowupOutcome::Finished);
        assert_eq!(messenger.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_run() {
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = scheduler(messenger.clone());

        let handle = scheduler.start("u", "c");
        assert!(scheduler.cancel("u"));
        assert_eq!(handle.await.unwrap(), FollowupOutcome::Cancelled);
        assert!(messenger.sent.lock().unwrap().is_empty());
        assert!(!scheduler.cancel("u"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_run_and_resets_flag() {
        let messenger = Arc::new(RecordingMessenger::default());
        let scheduler = scheduler(messenger.clone());

        let first = scheduler.start("u", "c");
        scheduler.mark_responded("u");
        let second = scheduler.start("u", "c");

        assert_eq!(first.await.unwrap(), FollowupOutcome::Cancelled);
        // The old run must not remove the new run's entry.
        assert!(scheduler.is_scheduled("u"));
        assert_eq!(second.await.unwrap(), FollowupOutcome::Finished);
        assert_eq!(messenger.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn mark_responded_without_run_is_noop() {
        let scheduler = scheduler(Arc::new(RecordingMessenger::default()));
        assert!(!scheduler.mark_responded("nobody"));
    }
}
