//! Inbound events and outbound keyboard types, transport-neutral.

/// One inbound update from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: String,
    pub chat_id: String,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn text(user_id: impl Into<String>, chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            kind: EventKind::Text(text.into()),
        }
    }

    /// Build from raw message text, recognising known commands.
    pub fn from_message(user_id: impl Into<String>, chat_id: impl Into<String>, text: &str) -> Self {
        let kind = match Command::parse(text) {
            Some(command) => EventKind::Command(command),
            None => EventKind::Text(text.to_string()),
        };
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            kind,
        }
    }

    pub fn callback(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        callback_id: impl Into<String>,
        data: &str,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            kind: EventKind::Callback {
                id: callback_id.into(),
                action: CallbackAction::parse(data),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command(Command),
    /// Inline button press. `id` must be acknowledged.
    Callback { id: String, action: CallbackAction },
    Text(String),
}

/// Named slash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    BookCall,
    Help,
    Info,
    Profile,
    Menu,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::BookCall,
        Command::Profile,
        Command::Help,
        Command::Info,
        Command::Menu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::BookCall => "bookcall",
            Self::Help => "help",
            Self::Info => "info",
            Self::Profile => "profile",
            Self::Menu => "menu",
        }
    }

    /// Menu description shown by the client.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Start => "Начать работу",
            Self::BookCall => "Записаться на звонок",
            Self::Help => "Связаться с экспертом",
            Self::Info => "Подробнее о YouMatch",
            Self::Profile => "Заполнить анкету",
            Self::Menu => "Список команд",
        }
    }

    /// Parse `/name` or `/name@botname`, ignoring trailing arguments.
    /// Unknown commands yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let head = text.trim().split_whitespace().next()?;
        let name = head.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// Callback payloads carried by inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    StartQuestionnaire,
    RelationshipYes,
    RelationshipNo,
    BookCall,
    FollowupYes,
    FollowupNo,
    Unknown(String),
}

impl CallbackAction {
    pub fn data(&self) -> &str {
        match self {
            Self::StartQuestionnaire => "start_questionnaire",
            Self::RelationshipYes => "q2_yes",
            Self::RelationshipNo => "q2_no",
            Self::BookCall => "book_call",
            Self::FollowupYes => "followup_yes",
            Self::FollowupNo => "followup_no",
            Self::Unknown(data) => data,
        }
    }

    pub fn parse(data: &str) -> Self {
        match data {
            "start_questionnaire" => Self::StartQuestionnaire,
            "q2_yes" => Self::RelationshipYes,
            "q2_no" => Self::RelationshipNo,
            "book_call" => Self::BookCall,
            "followup_yes" => Self::FollowupYes,
            "followup_no" => Self::FollowupNo,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(CallbackAction),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(action),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<InlineButton>>;

/// Entry of the client-side command menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl From<Command> for BotCommand {
    fn from(command: Command) -> Self {
        Self {
            command: command.name().to_string(),
            description: command.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/bookcall@youmatch_bot"), Some(Command::BookCall));
        assert_eq!(Command::parse("  /menu please"), Some(Command::Menu));
        assert_eq!(Command::parse("/HELP"), Some(Command::Help));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn unknown_command_is_text() {
        let event = InboundEvent::from_message("1", "1", "/weather");
        assert_eq!(event.kind, EventKind::Text("/weather".into()));
    }

    #[test]
    fn callback_data_round_trip() {
        for action in [
            CallbackAction::StartQuestionnaire,
            CallbackAction::RelationshipYes,
            CallbackAction::RelationshipNo,
            CallbackAction::BookCall,
            CallbackAction::FollowupYes,
            CallbackAction::FollowupNo,
        ] {
            assert_eq!(CallbackAction::parse(action.data()), action);
        }
        assert_eq!(
            CallbackAction::parse("mystery"),
            CallbackAction::Unknown("mystery".into())
        );
    }

    #[test]
    fn menu_covers_every_command() {
        let menu: Vec<BotCommand> = Command::ALL.into_iter().map(BotCommand::from).collect();
        assert_eq!(menu.len(), 6);
        assert_eq!(menu[0].command, "start");
        assert_eq!(menu[1].command, "bookcall");
    }
}
