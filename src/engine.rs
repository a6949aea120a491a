//! Retrieval-augmented chat engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::knowledge::KnowledgeBase;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::memory::ChatMemory;

/// Produces a reply for one user message.
///
/// On success the implementation records the exchange in `memory`. On
/// failure `memory` must be left as it was.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn respond(
        &self,
        memory: &mut ChatMemory,
        system_prompt: &str,
        message: &str,
    ) -> Result<String, LlmError>;
}

/// Number of passages injected into the system prompt by default.
pub const DEFAULT_TOP_K: usize = 4;

/// Injects the best-matching knowledge passages into the system prompt and
/// sends the memory window plus the new message to the model.
pub struct ContextChatEngine {
    llm: Arc<dyn LlmProvider>,
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
}

impl ContextChatEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            llm,
            knowledge,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn system_message(&self, system_prompt: &str, message: &str) -> String {
        let hits = self.knowledge.search(message, self.top_k);
        if hits.is_empty() {
            return system_prompt.to_string();
        }
        let context = hits
            .iter()
            .map(|hit| hit.snippet.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "{system_prompt}\n\n\
             Ниже приведены материалы, относящиеся к вопросу пользователя:\n\
             ---------------------\n\
             {context}\n\
             ---------------------"
        )
    }
}

#[async_trait]
impl ChatEngine for ContextChatEngine {
    async fn respond(
        &self,
        memory: &mut ChatMemory,
        system_prompt: &str,
        message: &str,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(memory.len() + 2);
        messages.push(ChatMessage::system(self.system_message(system_prompt, message)));
        messages.extend(memory.messages().iter().cloned());
        messages.push(ChatMessage::user(message));

        let response = self
            .llm
            .complete(CompletionRequest::new(messages).with_temperature(0.0))
            .await?;

        let reply = response.content.trim().to_string();
        if reply.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty completion".into(),
            });
        }
        tracing::debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Chat completion"
        );

        memory.put(ChatMessage::user(message));
        memory.put(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::knowledge::Passage;
    use crate::llm::{CompletionResponse, FinishReason, Role};

    /// Records requests and replies with a fixed text.
    struct StubLlm {
        reply: Result<String, ()>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StubLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "down".into(),
                }),
            }
        }
    }

    fn knowledge() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::from_passages(vec![Passage {
            source: "price.md".into(),
            text: "Стоимость программы обсуждается на звонке.".into(),
        }]))
    }

    #[tokio::test]
    async fn respond_appends_exchange() {
        let llm = Arc::new(StubLlm::replying("  Ответ  "));
        let engine = ContextChatEngine::new(llm.clone(), knowledge());
        let mut memory = ChatMemory::new(4000);
        memory.put(ChatMessage::user("раньше"));
        memory.put(ChatMessage::assistant("было"));

        let reply = engine
            .respond(&mut memory, "SYSTEM", "Какая стоимость?")
            .await
            .unwrap();
        assert_eq!(reply, "Ответ");
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.messages()[3], ChatMessage::assistant("Ответ"));

        let requests = llm.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.starts_with("SYSTEM"));
        assert!(request.messages[0].content.contains("обсуждается на звонке"));
        assert_eq!(request.messages[3], ChatMessage::user("Какая стоимость?"));
    }

    #[tokio::test]
    async fn no_hits_keeps_plain_prompt() {
        let llm = Arc::new(StubLlm::replying("ok"));
        let engine = ContextChatEngine::new(llm.clone(), knowledge());
        let mut memory = ChatMemory::new(4000);
        engine.respond(&mut memory, "SYSTEM", "привет").await.unwrap();
        assert_eq!(llm.requests.lock().unwrap()[0].messages[0].content, "SYSTEM");
    }

    #[tokio::test]
    async fn failure_leaves_memory_untouched() {
        let engine = ContextChatEngine::new(Arc::new(StubLlm::failing()), knowledge());
        let mut memory = ChatMemory::new(4000);
        memory.put(ChatMessage::user("раньше"));
        let before = memory.clone();

        assert!(engine.respond(&mut memory, "SYSTEM", "вопрос").await.is_err());
        assert_eq!(memory, before);
    }

    #[tokio::test]
    async fn empty_completion_is_invalid() {
        let engine = ContextChatEngine::new(Arc::new(StubLlm::replying("   ")), knowledge());
        let mut memory = ChatMemory::new(4000);
        let err = engine.respond(&mut memory, "S", "вопрос").await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
        assert!(memory.is_empty());
    }
}
