//! Chat pipeline: input check, crisis screening, context, completion.

use crate::completion::CompletionClient;
use crate::conversation::{Message, SharedConversation};
use crate::crisis::{is_crisis_message, CRISIS_RESPONSE};
use mindease_common::logging::preview;
use std::sync::Arc;

/// Reply for empty or whitespace-only input.
pub const EMPTY_MESSAGE_REPLY: &str = "Please say something.";

/// Instruction placed ahead of the conversation window in every prompt.
pub const SYSTEM_PROMPT: &str = "You are a compassionate and empathetic mental health support \
chatbot for students. Respond warmly and naturally. Do NOT give medical diagnoses. \
Encourage healthy coping strategies gently.";

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    EmptyInput,
    Crisis,
    Completion,
}

/// A reply plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub kind: ReplyKind,
    pub text: String,
}

/// Composes the conversation buffer and completion client.
#[derive(Clone)]
pub struct ChatService {
    conversation: SharedConversation,
    completion: Arc<CompletionClient>,
}

impl ChatService {
    pub fn new(conversation: SharedConversation, completion: Arc<CompletionClient>) -> Self {
        Self {
            conversation,
            completion,
        }
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    pub fn is_ai_configured(&self) -> bool {
        self.completion.is_configured()
    }

    /// Produce a reply for one user message.
    ///
    /// Empty input and crisis messages never touch the buffer or the client.
    pub async fn reply(&self, text: &str) -> ChatReply {
        let text = text.trim();
        if text.is_empty() {
            return ChatReply {
                kind: ReplyKind::EmptyInput,
                text: EMPTY_MESSAGE_REPLY.to_string(),
            };
        }

        if is_crisis_message(text) {
            tracing::warn!("Crisis keywords detected, sending helpline resources");
            return ChatReply {
                kind: ReplyKind::Crisis,
                text: CRISIS_RESPONSE.to_string(),
            };
        }

        self.conversation.append(Message::user(text));
        let prompt = build_prompt(self.conversation.snapshot());

        // No lock is held here; concurrent requests may interleave turns.
        let reply = self.completion.complete(prompt).await;

        self.conversation.append(Message::assistant(reply.as_str()));
        tracing::info!(reply = %preview(&reply, 100), "AI reply");

        ChatReply {
            kind: ReplyKind::Completion,
            text: reply,
        }
    }

    /// Clear the shared conversation window.
    pub fn reset(&self) {
        self.conversation.reset();
        tracing::info!("Chat history cleared");
    }
}

/// System instruction followed by the conversation window.
pub fn build_prompt(history: Vec<Message>) -> Vec<Message> {
    let mut prompt = Vec::with_capacity(history.len() + 1);
    prompt.push(Message::system(SYSTEM_PROMPT));
    prompt.extend(history);
    prompt
}
