//! UI-agnostic session state
//!
//! The dashboard and the headless CLI both drive a [`Session`]. Conversation
//! mutations go through [`crate::TurnController`]; the sensor reading is edited
//! directly by user input.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sensor::{SensorField, SensorReading};

pub const WELCOME_MESSAGE: &str = "Welcome to the **BusGuardian AI**. I can analyze bus heat data and answer your questions about this system. Use the panel on the left to simulate sensor data and click \"Analyze Heat Status\", or ask me a question below.";

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// Handle to a message appended optimistically. It must be either committed or
/// aborted; aborting removes exactly that message.
#[derive(Debug)]
#[must_use = "a tentative message must be committed or aborted"]
pub struct Tentative {
    id: String,
}

/// Chronological log of one session's messages.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History seeded with the assistant welcome message.
    pub fn seeded() -> Self {
        Self {
            messages: vec![ChatMessage::new(ChatRole::Assistant, WELCOME_MESSAGE)],
        }
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

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Phase one: append `message` and return the token that resolves it.
    pub(crate) fn begin(&mut self, message: ChatMessage) -> Tentative {
        let tentative = Tentative {
            id: message.id.clone(),
        };
        self.messages.push(message);
        tentative
    }

    /// The tentative message stays in place.
    pub(crate) fn commit(&mut self, tentative: Tentative) {
        let _ = tentative;
    }

    /// Removes the tentative message. Returns it if it was still present.
    pub(crate) fn abort(&mut self, tentative: Tentative) -> Option<ChatMessage> {
        let pos = self.messages.iter().rposition(|m| m.id == tentative.id)?;
        Some(self.messages.remove(pos))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient user-visible notification (the dashboard's toast line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn error(description: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            description: description.to_string(),
        }
    }

    pub fn info(title: &str, description: &str) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Everything one user session owns.
#[derive(Debug, Clone)]
pub struct Session {
    sensors: SensorReading,
    history: ConversationHistory,
    notices: Vec<Notice>,
    pub(crate) analyze_pending: bool,
    pub(crate) ask_pending: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SensorReading::default())
    }
}

impl Session {
    pub fn new(sensors: SensorReading) -> Self {
        Self {
            sensors,
            history: ConversationHistory::seeded(),
            notices: Vec::new(),
            analyze_pending: false,
            ask_pending: false,
        }
    }

    pub fn sensors(&self) -> &SensorReading {
        &self.sensors
    }

    pub fn adjust_sensor(&mut self, field: SensorField, steps: i32) {
        self.sensors.adjust(field, steps);
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn latest_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn is_analyze_pending(&self) -> bool {
        self.analyze_pending
    }

    pub fn is_ask_pending(&self) -> bool {
        self.ask_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_history_has_single_welcome() {
        let history = ConversationHistory::seeded();
        assert_eq!(history.len(), 1);
        let welcome = &history.messages()[0];
        assert_eq!(welcome.role, ChatRole::Assistant);
        assert!(welcome.content.starts_with("Welcome to the **BusGuardian AI**"));
    }

    #[test]
    fn message_ids_are_unique() {
        let a = ChatMessage::new(ChatRole::User, "hi");
        let b = ChatMessage::new(ChatRole::User, "hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn abort_removes_only_the_tentative_entry() {
        let mut history = ConversationHistory::seeded();
        let tentative = history.begin(ChatMessage::new(ChatRole::User, "first"));
        history.push(ChatMessage::new(ChatRole::Assistant, "later reply"));

        let removed = history.abort(tentative).expect("tentative message present");
        assert_eq!(removed.content, "first");
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().map(|m| m.content.as_str()), Some("later reply"));
    }

    #[test]
    fn commit_keeps_the_entry() {
        let mut history = ConversationHistory::new();
        let tentative = history.begin(ChatMessage::new(ChatRole::User, "kept"));
        history.commit(tentative);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChatRole::Assistant).unwrap(), "\"assistant\"");
    }
}
