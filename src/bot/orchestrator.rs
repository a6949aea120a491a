//! Routes inbound events to the questionnaire, commands, or a chat turn.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::channels::{
    BotCommand, CallbackAction, Command, EventKind, EventStream, InboundEvent, InlineButton,
    Keyboard, Messenger,
};
use crate::config::{FollowupConfig, LinkConfig};
use crate::engine::ChatEngine;
use crate::error::{ChannelError, DatabaseError, QuestionnaireError, TurnError};
use crate::followup::FollowupScheduler;
use crate::memory::ConversationMemoryStore;
use crate::prompts;
use crate::questionnaire::{
    Answer, QuestionnaireAnswers, QuestionnaireMachine, QuestionnaireState, RelationshipStatus,
    Step,
};
use crate::session::SessionLockRegistry;

use super::dispatch::UserQueues;

/// Where an inbound event is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command(Command),
    Callback { id: String, action: CallbackAction },
    /// Free text answering the current questionnaire step.
    Questionnaire(String),
    /// Free text for the chat engine.
    ChatTurn(String),
}

/// Collaborators for [`TurnOrchestrator`].
pub struct BotDeps {
    pub memory: Arc<ConversationMemoryStore>,
    pub engine: Arc<dyn ChatEngine>,
    pub messenger: Arc<dyn Messenger>,
    pub links: LinkConfig,
    pub guide_path: PathBuf,
    pub followup: FollowupConfig,
}

/// Composition root of the bot.
pub struct TurnOrchestrator {
    locks: SessionLockRegistry,
    memory: Arc<ConversationMemoryStore>,
    questionnaire: QuestionnaireMachine,
    followups: FollowupScheduler,
    engine: Arc<dyn ChatEngine>,
    messenger: Arc<dyn Messenger>,
    links: LinkConfig,
    guide_path: PathBuf,
    system_prompt: String,
}

impl TurnOrchestrator {
    pub fn new(deps: BotDeps) -> Self {
        let followups = FollowupScheduler::new(
            Arc::clone(&deps.messenger),
            deps.followup,
            deps.links.booking_url.clone(),
        );
        Self {
            locks: SessionLockRegistry::new(),
            memory: deps.memory,
            questionnaire: QuestionnaireMachine::new(),
            followups,
            engine: deps.engine,
            messenger: deps.messenger,
            links: deps.links,
            guide_path: deps.guide_path,
            system_prompt: prompts::MAIN_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn locks(&self) -> &SessionLockRegistry {
        &self.locks
    }

    pub fn questionnaire(&self) -> &QuestionnaireMachine {
        &self.questionnaire
    }

    pub fn followups(&self) -> &FollowupScheduler {
        &self.followups
    }

    /// Publish the command menu to the transport.
    pub async fn register_commands(&self) -> Result<(), ChannelError> {
        let commands: Vec<BotCommand> = Command::ALL.into_iter().map(BotCommand::from).collect();
        self.messenger.set_commands(&commands).await
    }

    /// Handle events until the stream ends.
    ///
    /// A user's events are handled one at a time in arrival order; different
    /// users run concurrently. Returns once every queued event is handled.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        info!("Bot is running");
        let mut queues = UserQueues::new(self);
        while let Some(event) = events.next().await {
            queues.dispatch(event);
        }
        info!(users = queues.len(), "Event stream closed, draining");
        queues.drain().await;
    }

    /// Commands and buttons always win; free text goes to the questionnaire
    /// while the user is mid-flow, otherwise to a chat turn.
    pub fn route(&self, event: &InboundEvent) -> Route {
        match &event.kind {
            EventKind::Command(command) => Route::Command(*command),
            EventKind::Callback { id, action } => Route::Callback {
                id: id.clone(),
                action: action.clone(),
            },
            EventKind::Text(text) if self.questionnaire.is_active(&event.user_id) => {
                Route::Questionnaire(text.clone())
            }
            EventKind::Text(text) => Route::ChatTurn(text.clone()),
        }
    }

    /// Handle one event. Transport failures are logged, never propagated.
    pub async fn handle_event(&self, event: InboundEvent) {
        let user_id = event.user_id.as_str();
        let chat_id = event.chat_id.as_str();

        let result = match self.route(&event) {
            Route::Command(command) => {
                info!(user_id, command = command.name(), "Command received");
                self.handle_command(user_id, chat_id, command).await
            }
            Route::Callback { id, action } => {
                if let Err(e) = self.messenger.answer_callback(&id).await {
                    warn!(user_id, error = %e, "Failed to acknowledge button press");
                }
                self.handle_callback(user_id, chat_id, action).await
            }
            Route::Questionnaire(text) => {
                self.answer_questionnaire(user_id, chat_id, Answer::Text(text))
                    .await
            }
            Route::ChatTurn(text) => {
                info!(user_id, "Text message received");
                self.handle_chat(user_id, chat_id, &text).await
            }
        };

        if let Err(e) = result {
            warn!(user_id, error = %e, "Failed to deliver reply");
        }
    }

    async fn handle_command(
        &self,
        user_id: &str,
        chat_id: &str,
        command: Command,
    ) -> Result<(), ChannelError> {
        match command {
            Command::Start => {
                if self.questionnaire.abandon(user_id) {
                    debug!(user_id, "Abandoned questionnaire on /start");
                }
                if let Err(e) = self.reset_session(user_id).await {
                    error!(user_id, op = "reset", error = %e, "Session reset failed");
                }
                let keyboard = url_button(prompts::BUTTON_BOOK_INTERVIEW, &self.links.booking_url);
                self.send(chat_id, prompts::STEP_WELCOME, Some(&keyboard)).await
            }
            Command::Profile => {
                let keyboard = vec![vec![InlineButton::callback(
                    prompts::BUTTON_FILL_PROFILE,
                    CallbackAction::StartQuestionnaire,
                )]];
                self.send(chat_id, prompts::STEP_1, Some(&keyboard)).await
            }
            Command::BookCall => {
                let keyboard = url_button(prompts::BUTTON_BOOK_CALL, &self.links.booking_url);
                self.send(chat_id, prompts::BOOK_CALL_PROMPT, Some(&keyboard))
                    .await
            }
            Command::Help => {
                let keyboard = url_button(prompts::BUTTON_CONTACT_EXPERT, &self.links.concierge_url);
                self.send(chat_id, prompts::HELP_TEXT, Some(&keyboard)).await
            }
            Command::Info => {
                let keyboard = url_button(
                    prompts::BUTTON_FOUNDER_INTERVIEW,
                    &self.links.founder_interview_url,
                );
                self.send(chat_id, prompts::ABOUT_YOUMATCH, Some(&keyboard))
                    .await
            }
            Command::Menu => self.send(chat_id, prompts::COMMANDS_LIST, None).await,
        }
    }

    async fn handle_callback(
        &self,
        user_id: &str,
        chat_id: &str,
        action: CallbackAction,
    ) -> Result<(), ChannelError> {
        match action {
            CallbackAction::StartQuestionnaire => {
                let state = self.questionnaire.start(user_id);
                info!(user_id, "Questionnaire started");
                self.ask(chat_id, state).await
            }
            CallbackAction::RelationshipYes => {
                let answer = Answer::Relationship(RelationshipStatus::Yes);
                self.answer_questionnaire(user_id, chat_id, answer).await
            }
            CallbackAction::RelationshipNo => {
                let answer = Answer::Relationship(RelationshipStatus::No);
                self.answer_questionnaire(user_id, chat_id, answer).await
            }
            CallbackAction::BookCall => {
                let text = prompts::book_call_link(&self.links.booking_url);
                self.send(chat_id, &text, None).await
            }
            CallbackAction::FollowupYes => {
                self.followups.mark_responded(user_id);
                self.send(chat_id, prompts::FOLLOWUP_YES_REPLY, None).await
            }
            CallbackAction::FollowupNo => {
                self.followups.mark_responded(user_id);
                let keyboard = url_button(prompts::BUTTON_PERSONAL_REVIEW, &self.links.booking_url);
                self.send(chat_id, prompts::FOLLOWUP_NO_REPLY, Some(&keyboard))
                    .await
            }
            CallbackAction::Unknown(data) => {
                debug!(user_id, data = %data, "Ignoring unknown button");
                Ok(())
            }
        }
    }

    async fn answer_questionnaire(
        &self,
        user_id: &str,
        chat_id: &str,
        answer: Answer,
    ) -> Result<(), ChannelError> {
        match self.questionnaire.submit(user_id, answer) {
            Ok(Step::Next(state)) => self.ask(chat_id, state).await,
            Ok(Step::Completed(answers)) => {
                self.complete_questionnaire(user_id, chat_id, answers).await
            }
            Err(QuestionnaireError::InvalidAnswer { step, reason }) => {
                debug!(user_id, step = %step, reason = %reason, "Answer rejected");
                let state = self.questionnaire.state(user_id);
                if state.expects_choice() {
                    if let Err(e) = self.send(chat_id, prompts::CHOOSE_YES_OR_NO, None).await {
                        warn!(user_id, error = %e, "Failed to send answer hint");
                    }
                }
                self.ask(chat_id, state).await
            }
            Err(QuestionnaireError::NotActive { .. }) => {
                debug!(user_id, "Stale questionnaire button ignored");
                Ok(())
            }
        }
    }

    async fn complete_questionnaire(
        &self,
        user_id: &str,
        chat_id: &str,
        answers: QuestionnaireAnswers,
    ) -> Result<(), ChannelError> {
        info!(user_id, "Questionnaire completed");
        let summary = answers.summary(user_id);
        {
            let _guard = self.locks.acquire(user_id).await;
            if let Err(e) = self.memory.save_summary(user_id, &summary).await {
                error!(user_id, op = "save_summary", error = %e, "Failed to store questionnaire summary");
            }
        }

        // Transport failures below never stop the follow-ups from starting.
        let keyboard = url_button(prompts::BUTTON_PERSONAL_REVIEW, &self.links.booking_url);
        if let Err(e) = self.send(chat_id, prompts::STEP_RESULT, Some(&keyboard)).await {
            warn!(user_id, error = %e, "Failed to send questionnaire result");
        }

        if let Err(e) = self.messenger.send_document(chat_id, &self.guide_path).await {
            warn!(user_id, path = %self.guide_path.display(), error = %e, "Failed to send guide");
        }

        self.followups.start(user_id, chat_id);
        Ok(())
    }

    async fn handle_chat(&self, user_id: &str, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        match self.chat_turn(user_id, text).await {
            Ok(reply) => self.send(chat_id, &reply, None).await,
            Err(e) => {
                error!(user_id, op = "chat_turn", error = %e, "Chat turn failed");
                self.send(chat_id, prompts::GENERIC_FAILURE, None).await
            }
        }
    }

    /// Run one chat turn under the user's lock.
    ///
    /// Memory is persisted only when the engine succeeds. The lock guard is
    /// dropped on every return path.
    pub async fn chat_turn(&self, user_id: &str, text: &str) -> Result<String, TurnError> {
        let _guard = self.locks.acquire(user_id).await;
        let mut memory = self.memory.load(user_id).await?;
        let reply = self
            .engine
            .respond(&mut memory, &self.system_prompt, text)
            .await?;
        self.memory.save_turn(user_id, &memory, &reply).await?;
        debug!(user_id, "Chat turn complete");
        Ok(reply)
    }

    /// Overwrite the user's memory with the fresh default and clear the last
    /// context. Does not take the session lock.
    pub async fn reset_session(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.memory.reset(user_id).await
    }

    async fn ask(&self, chat_id: &str, state: QuestionnaireState) -> Result<(), ChannelError> {
        let Some(prompt) = state.prompt() else {
            return Ok(());
        };
        if state.expects_choice() {
            let keyboard = vec![
                vec![InlineButton::callback(
                    prompts::BUTTON_YES,
                    CallbackAction::RelationshipYes,
                )],
                vec![InlineButton::callback(
                    prompts::BUTTON_NO,
                    CallbackAction::RelationshipNo,
                )],
            ];
            self.send(chat_id, prompt, Some(&keyboard)).await
        } else {
            self.send(chat_id, prompt, None).await
        }
    }

    async fn send(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.messenger.send_text(chat_id, text, keyboard).await
    }
}

fn url_button(text: &str, url: &str) -> Keyboard {
    vec![vec![InlineButton::url(text, url)]]
}
