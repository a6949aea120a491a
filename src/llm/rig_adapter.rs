//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our flat message list into rig's (preamble, history, prompt) shape.
///
/// System messages are merged into the preamble. The last user message becomes
/// the prompt; everything between is chat history.
fn split_messages(
    messages: Vec<ChatMessage>,
) -> Result<(Option<String>, Vec<Message>, Message), LlmError> {
    let mut system_parts = Vec::new();
    let mut history = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system_parts.push(message.content),
            Role::User => history.push(Message::user(message.content)),
            Role::Assistant => history.push(Message::assistant(message.content)),
        }
    }

    let prompt = history.pop().ok_or(LlmError::EmptyRequest)?;
    let preamble = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    Ok((preamble, history, prompt))
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(request.messages)?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
            finish_reason: FinishReason::Stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_merges_system_and_pops_prompt() {
        let (preamble, history, _prompt) = split_messages(vec![
            ChatMessage::system("a"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
            ChatMessage::system("b"),
            ChatMessage::user("question"),
        ])
        .unwrap();
        assert_eq!(preamble.as_deref(), Some("a\n\nb"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn split_rejects_system_only() {
        let result = split_messages(vec![ChatMessage::system("only")]);
        assert!(matches!(result, Err(LlmError::EmptyRequest)));
    }
}
