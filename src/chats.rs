use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A titled message history bound to one provider/model pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub title: String,
    #[serde(rename = "chat_history")]
    history: Vec<Message>,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// File this conversation was loaded from or first saved to.
    #[serde(skip)]
    pub(crate) path: Option<PathBuf>,
}

impl Conversation {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            title: DEFAULT_TITLE.to_string(),
            history: Vec::new(),
            provider: provider.into(),
            model: model.into(),
            created_at: now,
            updated_at: now,
            path: None,
        }
    }

    /// Starts a conversation whose first message is the model's system prompt.
    pub fn with_system_prompt(
        provider: impl Into<String>,
        model: impl Into<String>,
        system_prompt: &str,
    ) -> Self {
        let mut conversation = Self::new(provider, model);
        conversation.push(Role::System, system_prompt);
        conversation
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        let content = content.into();
        if role == Role::User && self.title == DEFAULT_TITLE && self.path.is_none() {
            if let Some(title) = title_from(&content) {
                self.title = title;
            }
        }
        self.history.push(Message::new(role, content));
        self.updated_at = Utc::now();
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Messages shown in the chat log: everything but a leading system prompt.
    pub fn visible_messages(&self) -> &[Message] {
        match self.history.first() {
            Some(first) if first.role == Role::System => &self.history[1..],
            _ => &self.history,
        }
    }

    /// A conversation holding only its system prompt is not worth keeping.
    pub fn has_exchange(&self) -> bool {
        self.history.len() > 1
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

fn title_from(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(TITLE_MAX_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_hidden_from_log() {
        let mut conversation = Conversation::with_system_prompt("openai", "gpt-4o", "Be brief.");
        assert!(conversation.visible_messages().is_empty());
        assert!(!conversation.has_exchange());

        conversation.push(Role::User, "hi");
        assert_eq!(conversation.visible_messages(), &[Message::new(Role::User, "hi")]);
        assert!(conversation.has_exchange());
    }

    #[test]
    fn first_user_line_becomes_title() {
        let mut conversation = Conversation::with_system_prompt("openai", "gpt-4o", "sys");
        conversation.push(Role::User, "\n  Explain lifetimes  \nplease");
        assert_eq!(conversation.title, "Explain lifetimes");

        conversation.push(Role::User, "second question");
        assert_eq!(conversation.title, "Explain lifetimes");
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let conversation = Conversation::with_system_prompt("openai", "gpt-4o", "sys");
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["chat_history"][0]["role"], "system");
        assert_eq!(value["provider"], "openai");
        assert!(value.get("created_at").is_some());
        assert!(value.get("path").is_none());
    }
}
