//! Conversational memory: a bounded window of chat messages and its
//! persisted encoding.

mod store;

pub use store::ConversationMemoryStore;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::llm::{ChatMessage, Role};

/// Current encoding version written by [`ChatMemory::to_bytes`].
pub const MEMORY_FORMAT_VERSION: u32 = 1;

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Ordered chat history bounded by an estimated token budget.
///
/// The oldest messages are evicted first, and the window never begins with
/// an assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMemory {
    token_limit: usize,
    messages: Vec<ChatMessage>,
}

/// On-disk shape of a memory blob.
#[derive(Serialize, Deserialize)]
struct MemoryEnvelope {
    version: u32,
    token_limit: usize,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            messages: Vec::new(),
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Estimated tokens held by the window.
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| estimate_tokens(&m.content)).sum()
    }

    /// Append a message and evict from the front until the window fits.
    pub fn put(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.trim();
    }

    fn trim(&mut self) {
        // The newest message always stays, even if it alone exceeds the token limit.
        while self.messages.len() > 1 && self.estimated_tokens() > self.token_limit {
            self.messages.remove(0);
        }
        while self
            .messages
            .first()
            .is_some_and(|m| m.role == Role::Assistant)
        {
            self.messages.remove(0);
        }
    }

    /// Encode as a versioned JSON envelope.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MemoryError> {
        let envelope = MemoryEnvelope {
            version: MEMORY_FORMAT_VERSION,
            token_limit: self.token_limit,
            messages: self.messages.clone(),
        };
        serde_json::to_vec(&envelope).map_err(|e| MemoryError::Serialization(e.to_string()))
    }

    /// Decode a blob produced by [`ChatMemory::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemoryError> {
        let probe: VersionProbe =
            serde_json::from_slice(bytes).map_err(|e| MemoryError::Deserialization(e.to_string()))?;
        if probe.version != MEMORY_FORMAT_VERSION {
            return Err(MemoryError::UnsupportedVersion {
                found: probe.version,
                expected: MEMORY_FORMAT_VERSION,
            });
        }

        let envelope: MemoryEnvelope =
            serde_json::from_slice(bytes).map_err(|e| MemoryError::Deserialization(e.to_string()))?;
        if envelope.messages.iter().any(|m| m.role == Role::System) {
            return Err(MemoryError::Deserialization(
                "system messages are not stored in memory".into(),
            ));
        }
        Ok(Self {
            token_limit: envelope.token_limit,
            messages: envelope.messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // Counted in characters, not bytes.
        assert_eq!(estimate_tokens("привет"), 2);
    }

    #[test]
    fn put_evicts_oldest() {
        let mut memory = ChatMemory::new(4);
        memory.put(ChatMessage::user("aaaaaaaa")); // 2
        memory.put(ChatMessage::assistant("bbbbbbbb")); // 2
        memory.put(ChatMessage::user("cccccccc")); // 2

        // "aaaa" evicted, then the leading assistant message.
        assert_eq!(memory.messages(), &[ChatMessage::user("cccccccc")]);
    }

    #[test]
    fn window_never_starts_with_assistant() {
        let mut memory = ChatMemory::new(100);
        memory.put(ChatMessage::assistant("hello"));
        assert!(memory.is_empty());

        memory.put(ChatMessage::user("hi"));
        memory.put(ChatMessage::assistant("hello"));
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn oversized_message_is_kept_alone() {
        let mut memory = ChatMemory::new(1);
        memory.put(ChatMessage::user("a long question that exceeds the token limit"));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn encoding_round_trip() {
        let mut memory = ChatMemory::new(4000);
        memory.put(ChatMessage::user("Сколько стоит?"));
        memory.put(ChatMessage::assistant("Зависит от программы."));

        let bytes = memory.to_bytes().unwrap();
        assert_eq!(ChatMemory::from_bytes(&bytes).unwrap(), memory);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ChatMemory::from_bytes(b"\x80\x04pickle"),
            Err(MemoryError::Deserialization(_))
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let bytes = br#"{"version":9,"token_limit":10,"messages":[]}"#;
        assert!(matches!(
            ChatMemory::from_bytes(bytes),
            Err(MemoryError::UnsupportedVersion { found: 9, expected: 1 })
        ));
    }

    #[test]
    fn rejects_stored_system_message() {
        let bytes =
            br#"{"version":1,"token_limit":10,"messages":[{"role":"system","content":"x"}]}"#;
        assert!(ChatMemory::from_bytes(bytes).is_err());
    }
}
