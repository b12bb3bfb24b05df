//! Conversation data model: messages and the append-only conversation log.
//!
//! The log is owned by the session controller. It only grows, with one
//! exception: a voice message receives its accuracy/corrections patch once,
//! asynchronously, after it already exists in the log. The patch is addressed
//! by `id` so it lands on the right turn even if other messages were appended
//! in the interim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// How a user message was entered. Only meaningful for `Role::User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Voice,
    Typed,
}

/// One turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<InputMode>,
    /// 0..=100, present only for voice user messages after analysis completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrections: Option<Vec<String>>,
}

impl Message {
    /// A user turn. Accuracy and corrections start unset; voice messages get
    /// them patched later by id.
    pub fn user(content: impl Into<String>, input_mode: InputMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            input_mode: Some(input_mode),
            accuracy: None,
            corrections: None,
        }
    }

    /// An assistant turn (real reply or synthetic error text).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            input_mode: None,
            accuracy: None,
            corrections: None,
        }
    }
}

/// Append-only conversation log with the single late accuracy patch.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id.
    pub fn push(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Attach accuracy/corrections to the message with `id`. Applied at most
    /// once per message; returns the patched message, or `None` if the id is
    /// unknown or the message was already patched.
    pub fn patch_accuracy(
        &mut self,
        id: Uuid,
        accuracy: u8,
        corrections: Vec<String>,
    ) -> Option<&Message> {
        let msg = self
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.accuracy.is_none())?;
        msg.accuracy = Some(accuracy.min(100));
        msg.corrections = Some(corrections);
        Some(msg)
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_lands_on_correct_id() {
        let mut log = ConversationLog::new();
        let first = log.push(Message::user("good morning", InputMode::Voice));
        let _reply = log.push(Message::assistant("Good morning to you!"));
        let second = log.push(Message::user("how are you", InputMode::Voice));

        log.patch_accuracy(second, 92, vec![]).unwrap();
        log.patch_accuracy(first, 74, vec!["Say 'good' more clearly".into()])
            .unwrap();

        assert_eq!(log.get(first).unwrap().accuracy, Some(74));
        assert_eq!(log.get(second).unwrap().accuracy, Some(92));
    }

    #[test]
    fn patch_applies_at_most_once() {
        let mut log = ConversationLog::new();
        let id = log.push(Message::user("hello", InputMode::Voice));

        assert!(log.patch_accuracy(id, 88, vec![]).is_some());
        assert!(log.patch_accuracy(id, 10, vec![]).is_none());
        assert_eq!(log.get(id).unwrap().accuracy, Some(88));
    }

    #[test]
    fn accuracy_clamped_to_percentage() {
        let mut log = ConversationLog::new();
        let id = log.push(Message::user("hi", InputMode::Voice));
        log.patch_accuracy(id, 255, vec![]);
        assert_eq!(log.get(id).unwrap().accuracy, Some(100));
    }

    #[test]
    fn typed_messages_carry_their_mode() {
        let msg = Message::user("typed text", InputMode::Typed);
        assert_eq!(msg.input_mode, Some(InputMode::Typed));
        assert!(msg.accuracy.is_none());
    }
}
