//! `Database` trait, the async interface for conversation memory persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// Persisted per-user memory record.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub user_id: String,
    /// Encoded memory. `None` means no history yet.
    pub serialized_memory: Option<Vec<u8>>,
    /// Free text: the last bot reply or the questionnaire summary.
    pub last_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a single column is touched by an update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    /// Leave the stored value as is.
    #[default]
    Keep,
    /// Overwrite with a value.
    Set(T),
    /// Overwrite with NULL.
    Clear,
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// The value to write, or `None` for NULL (and for `Keep`).
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Keep | Self::Clear => None,
        }
    }
}

/// Partial update of a memory record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryUpdate {
    pub serialized_memory: FieldUpdate<Vec<u8>>,
    pub last_context: FieldUpdate<String>,
}

impl MemoryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(mut self, bytes: Vec<u8>) -> Self {
        self.serialized_memory = FieldUpdate::Set(bytes);
        self
    }

    pub fn clear_memory(mut self) -> Self {
        self.serialized_memory = FieldUpdate::Clear;
        self
    }

    pub fn context(mut self, text: impl Into<String>) -> Self {
        self.last_context = FieldUpdate::Set(text.into());
        self
    }

    pub fn clear_context(mut self) -> Self {
        self.last_context = FieldUpdate::Clear;
        self
    }
}

/// Backend-agnostic storage for conversation memory records.
///
/// Implementations must make both operations safe under concurrent calls.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Return the record for `user_id`, creating an empty one if absent.
    async fn get_or_create_memory(&self, user_id: &str) -> Result<MemoryRecord, DatabaseError>;

    /// Apply a partial update as one atomic upsert. Always bumps `updated_at`.
    async fn upsert_memory(&self, user_id: &str, update: &MemoryUpdate)
    -> Result<(), DatabaseError>;

    /// Number of stored memory records. Diagnostics only: reported in the
    /// startup banner, never consulted by the turn logic.
    async fn count_memory_records(&self) -> Result<u64, DatabaseError>;
}
