//! Configuration types.
//!
//! Everything is read from the environment once at startup and treated as
//! immutable afterwards.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default conversational memory capacity, in estimated tokens.
pub const DEFAULT_MEMORY_TOKEN_LIMIT: usize = 4000;

/// What to do when a persisted memory blob cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptMemoryPolicy {
    /// Log a warning and continue with a fresh memory. The blob is overwritten
    /// by the next successful turn.
    #[default]
    Reset,
    /// Fail the turn with a deserialization error.
    Fail,
}

impl std::str::FromStr for CorruptMemoryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "fail" => Ok(Self::Fail),
            other => Err(ConfigError::InvalidValue {
                key: "CORRUPT_MEMORY_POLICY".into(),
                message: format!("expected 'reset' or 'fail', got '{other}'"),
            }),
        }
    }
}

/// Conversational memory settings.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Capacity of a fresh memory, in estimated tokens.
    pub token_limit: usize,
    pub corrupt_policy: CorruptMemoryPolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            token_limit: DEFAULT_MEMORY_TOKEN_LIMIT,
            corrupt_policy: CorruptMemoryPolicy::default(),
        }
    }
}

/// Follow-up reminder delays.
#[derive(Debug, Clone)]
pub struct FollowupConfig {
    /// Wait before reminder A.
    pub first_delay: Duration,
    /// Wait between reminder A and reminder B.
    pub second_delay: Duration,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(3600),      // 1 hour
            second_delay: Duration::from_secs(6 * 3600), // 6 hours
        }
    }
}

/// External links shown on buttons.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Calendar booking page.
    pub booking_url: String,
    /// Concierge chat (from the corporate contact handle).
    pub concierge_url: String,
    /// Founder interview video shown by `/info`.
    pub founder_interview_url: String,
}

impl LinkConfig {
    pub const DEFAULT_FOUNDER_INTERVIEW_URL: &'static str =
        "https://youtu.be/q58np51o4Pk?feature=shared";
}

/// Telegram transport settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub allowed_users: Vec<String>,
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub database_path: PathBuf,
    pub links: LinkConfig,
    pub knowledge_dir: PathBuf,
    pub guide_path: PathBuf,
    pub memory: MemoryConfig,
    pub followup: FollowupConfig,
}

impl BotConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bot_token = SecretString::from(required("TELEGRAM_BOT_TOKEN")?);
        let allowed_users = parse_list(&optional("TELEGRAM_ALLOWED_USERS", "*"));

        let backend: LlmBackend = optional("YOUMATCH_LLM_BACKEND", "openai").parse()?;
        let api_key = SecretString::from(required(backend.api_key_var())?);
        let model = optional("YOUMATCH_MODEL", "gpt-4o");

        let database_path = parse_database_url(&optional("DATABASE_URL", "./data/youmatch.db"));

        let links = LinkConfig {
            booking_url: required("CALENDLY_URL")?,
            concierge_url: concierge_url(&required("CORPORATE_CHAT")?),
            founder_interview_url: optional(
                "FOUNDER_INTERVIEW_URL",
                LinkConfig::DEFAULT_FOUNDER_INTERVIEW_URL,
            ),
        };

        let memory = MemoryConfig {
            token_limit: parse_number("MEMORY_TOKEN_LIMIT", lookup("MEMORY_TOKEN_LIMIT"))?
                .unwrap_or(DEFAULT_MEMORY_TOKEN_LIMIT as u64) as usize,
            corrupt_policy: optional("CORRUPT_MEMORY_POLICY", "reset").parse()?,
        };

        let defaults = FollowupConfig::default();
        let followup = FollowupConfig {
            first_delay: parse_number(
                "FOLLOWUP_FIRST_DELAY_SECS",
                lookup("FOLLOWUP_FIRST_DELAY_SECS"),
            )?
            .map(Duration::from_secs)
            .unwrap_or(defaults.first_delay),
            second_delay: parse_number(
                "FOLLOWUP_SECOND_DELAY_SECS",
                lookup("FOLLOWUP_SECOND_DELAY_SECS"),
            )?
            .map(Duration::from_secs)
            .unwrap_or(defaults.second_delay),
        };

        Ok(Self {
            telegram: TelegramConfig {
                bot_token,
                allowed_users,
            },
            llm: LlmConfig {
                backend,
                api_key,
                model,
            },
            database_path,
            links,
            knowledge_dir: PathBuf::from(optional("KNOWLEDGE_DIR", "./data_index")),
            guide_path: PathBuf::from(optional("GUIDE_PATH", "./content/guide.pdf")),
            memory,
            followup,
        })
    }
}

/// Split a comma-separated list, dropping empty entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accept a bare path or a `sqlite://` / `file:` URL.
fn parse_database_url(raw: &str) -> PathBuf {
    let path = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("file:"))
        .unwrap_or(raw);
    PathBuf::from(path)
}

/// Turn a contact handle (`@name`, `name`, or a full URL) into a link.
fn concierge_url(handle: &str) -> String {
    if handle.starts_with("http://") || handle.starts_with("https://") {
        handle.to_string()
    } else {
        format!("https://t.me/{}", handle.trim_start_matches('@'))
    }
}

fn parse_number(key: &str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{v}': {e}"),
            }),
    }
}
