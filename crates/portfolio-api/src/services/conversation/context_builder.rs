use crate::models::chat::{ChatMessage, StoredMessage};

/// Assembles the exact message list sent to the gateway:
/// system prompt, then the most recent stored messages, then the new user turn.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    history_window: usize,
}

impl ContextBuilder {
    pub fn new(system_prompt: String, history_window: usize) -> Self {
        Self {
            system_prompt,
            history_window,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Older messages beyond the window are dropped, not summarized.
    pub fn build_messages(&self, history: &[StoredMessage], user_message: &str) -> Vec<ChatMessage> {
        let start = history.len().saturating_sub(self.history_window);
        let recent = &history[start..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        messages.extend(recent.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(user_message));
        messages
    }
}
