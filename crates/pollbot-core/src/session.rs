use std::collections::HashMap;

use crate::domain::ChatId;

/// The command a chat most recently ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCommand {
    pub name: String,
    /// Whether the command was registered with a text-input continuation.
    pub accepts_text: bool,
}

/// Per-chat record of the last dispatched command.
///
/// Entries never expire; they are replaced by the next command in the same
/// chat or removed by [`SessionStore::cancel`].
#[derive(Debug, Default)]
pub struct SessionStore {
    pending: HashMap<ChatId, PendingCommand>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, chat_id: ChatId, name: impl Into<String>, accepts_text: bool) {
        self.pending.insert(
            chat_id,
            PendingCommand {
                name: name.into(),
                accepts_text,
            },
        );
    }

    pub fn pending(&self, chat_id: ChatId) -> Option<&PendingCommand> {
        self.pending.get(&chat_id)
    }

    /// Command awaiting free text in this chat, if any.
    pub fn awaiting_text(&self, chat_id: ChatId) -> Option<&str> {
        self.pending
            .get(&chat_id)
            .filter(|p| p.accepts_text)
            .map(|p| p.name.as_str())
    }

    /// Stop routing text to a continuation. Returns the cancelled command name.
    ///
    /// Entries for commands without a continuation are left in place.
    pub fn cancel(&mut self, chat_id: ChatId) -> Option<String> {
        self.awaiting_text(chat_id)?;
        self.pending.remove(&chat_id).map(|p| p.name)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
