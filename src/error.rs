//! Error types for the YouMatch bot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Questionnaire error: {0}")]
    Questionnaire(#[from] QuestionnaireError),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Turn failed: {0}")]
    Turn(#[from] TurnError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request has no user message to send")]
    EmptyRequest,
}

/// Conversational memory encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Stored memory is unreadable: {0}")]
    Deserialization(String),

    #[error("Unsupported memory format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Failed to encode memory: {0}")]
    Serialization(String),
}

/// Questionnaire flow errors.
#[derive(Debug, thiserror::Error)]
pub enum QuestionnaireError {
    #[error("No questionnaire in progress for user {user_id}")]
    NotActive { user_id: String },

    #[error("Answer not accepted at step {step}: {reason}")]
    InvalidAnswer { step: String, reason: String },
}

/// Knowledge base (retrieval corpus) errors.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Knowledge directory not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single chat turn, as seen at the turn boundary.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("storage: {0}")]
    Storage(#[from] DatabaseError),

    #[error("memory: {0}")]
    Deserialization(#[from] MemoryError),

    #[error("engine: {0}")]
    Engine(#[from] LlmError),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
