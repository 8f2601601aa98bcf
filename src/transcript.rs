//! UI-agnostic transcript types
//!
//! The transcript is what the user sees of a chat session: messages in the
//! order they were appended, plus a placeholder for every reply that is
//! still on its way. It does not depend on any particular UI framework.

use serde::{Deserialize, Serialize};

use crate::sanitize;

/// Who a transcript message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

impl Role {
    /// Assistant and error messages close a submission cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Role::Assistant | Role::Error)
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Role::Error, text)
    }
}

/// Identifies the "assistant is composing" placeholder of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(Message),
    Pending(PendingId),
}

/// Where the chat controller renders to.
///
/// The terminal front-end, the one-shot CLI and the tests all supply
/// their own sink.
pub trait TranscriptSink {
    /// Append a message. Implementations must pass the text through
    /// [`sanitize::for_display`] before showing it.
    fn append(&mut self, message: Message);

    /// Show a new pending indicator and return its handle.
    fn show_pending(&mut self) -> PendingId;

    /// Remove a pending indicator. Returns false if it was not shown.
    fn remove_pending(&mut self, id: PendingId) -> bool;
}

/// Append-only list of messages and pending indicators.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_pending: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Messages only, in insertion order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Message(message) => Some(message),
            Entry::Pending(_) => None,
        })
    }

    pub fn message_count(&self) -> usize {
        self.messages().count()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages().last()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Entry::Pending(_)))
            .count()
    }

    pub fn is_pending(&self, id: PendingId) -> bool {
        self.entries.contains(&Entry::Pending(id))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TranscriptSink for Transcript {
    fn append(&mut self, message: Message) {
        let text = sanitize::for_display(&message.text);
        self.entries.push(Entry::Message(Message::new(message.role, text)));
    }

    fn show_pending(&mut self) -> PendingId {
        let id = PendingId(self.next_pending);
        self.next_pending += 1;
        self.entries.push(Entry::Pending(id));
        id
    }

    fn remove_pending(&mut self, id: PendingId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != Entry::Pending(id));
        self.entries.len() != before
    }
}
