//! Per-user memory records on top of the `Database` trait.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{CorruptMemoryPolicy, MemoryConfig};
use crate::error::{DatabaseError, MemoryError, TurnError};
use crate::memory::ChatMemory;
use crate::store::{Database, MemoryRecord, MemoryUpdate};

/// Owns the memory record lifecycle: creation, encoding, and updates.
///
/// Callers that read-modify-write a record must hold the user's session lock.
/// [`ConversationMemoryStore::reset`] is the one exception.
pub struct ConversationMemoryStore {
    db: Arc<dyn Database>,
    config: MemoryConfig,
}

impl ConversationMemoryStore {
    pub fn new(db: Arc<dyn Database>, config: MemoryConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Existing record, or a new one with null memory and null context.
    pub async fn get_or_create(&self, user_id: &str) -> Result<MemoryRecord, DatabaseError> {
        self.db.get_or_create_memory(user_id).await.inspect_err(|e| {
            warn!(user_id, op = "get_or_create", error = %e, "Memory storage failed");
        })
    }

    /// Empty memory with the configured capacity.
    pub fn fresh_memory(&self) -> ChatMemory {
        ChatMemory::new(self.config.token_limit)
    }

    pub fn serialize(&self, memory: &ChatMemory) -> Result<Vec<u8>, MemoryError> {
        memory.to_bytes()
    }

    /// Null or empty bytes mean "no history yet" and decode to a fresh memory.
    pub fn deserialize(&self, bytes: Option<&[u8]>) -> Result<ChatMemory, MemoryError> {
        match bytes {
            None => Ok(self.fresh_memory()),
            Some([]) => Ok(self.fresh_memory()),
            Some(bytes) => ChatMemory::from_bytes(bytes),
        }
    }

    /// Load a user's memory, applying the corrupt-blob policy.
    pub async fn load(&self, user_id: &str) -> Result<ChatMemory, TurnError> {
        let record = self.get_or_create(user_id).await?;
        match self.deserialize(record.serialized_memory.as_deref()) {
            Ok(memory) => Ok(memory),
            Err(e) => match self.config.corrupt_policy {
                CorruptMemoryPolicy::Reset => {
                    warn!(
                        user_id,
                        error = %e,
                        "Stored memory unreadable, continuing with a fresh memory"
                    );
                    Ok(self.fresh_memory())
                }
                CorruptMemoryPolicy::Fail => {
                    warn!(user_id, op = "deserialize", error = %e, "Stored memory unreadable");
                    Err(TurnError::Deserialization(e))
                }
            },
        }
    }

    /// Partial atomic update. Storage failures surface to the caller.
    pub async fn update(&self, user_id: &str, update: &MemoryUpdate) -> Result<(), DatabaseError> {
        self.db.upsert_memory(user_id, update).await.inspect_err(|e| {
            warn!(user_id, op = "update", error = %e, "Memory storage failed");
        })
    }

    /// Persist the outcome of a completed chat turn.
    pub async fn save_turn(
        &self,
        user_id: &str,
        memory: &ChatMemory,
        reply: &str,
    ) -> Result<(), TurnError> {
        let bytes = self.serialize(memory)?;
        self.update(user_id, &MemoryUpdate::new().memory(bytes).context(reply))
            .await?;
        debug!(user_id, messages = memory.len(), "Turn persisted");
        Ok(())
    }

    /// Record the questionnaire summary as the last context.
    pub async fn save_summary(&self, user_id: &str, summary: &str) -> Result<(), DatabaseError> {
        self.update(user_id, &MemoryUpdate::new().context(summary))
            .await
    }

    /// Overwrite memory with the fresh default and clear the last context.
    ///
    /// Runs without the session lock, so a chat turn already in flight may
    /// write its result afterwards (last write wins).
    pub async fn reset(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.update(user_id, &MemoryUpdate::new().clear_memory().clear_context())
            .await?;
        debug!(user_id, "Memory reset");
        Ok(())
    }
}
