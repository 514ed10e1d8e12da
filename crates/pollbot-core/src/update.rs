use crate::messaging::types::{CallbackQuery, Message, RawUpdate};

/// A classified update. Every raw update maps to exactly one variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    Text(Message),
    Command { name: String, message: Message },
    Callback(CallbackQuery),
    /// Anything else, kept as received.
    Unrecognized(RawUpdate),
}

impl Update {
    pub fn kind(&self) -> &'static str {
        match self {
            Update::Text(_) => "text",
            Update::Command { .. } => "command",
            Update::Callback(_) => "callback_query",
            Update::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Command name carried by a `/command` message: the trimmed text minus its
/// leading marker. Arguments are not split off.
pub fn command_name(text: &str) -> String {
    let mut chars = text.trim().chars();
    chars.next();
    chars.as_str().to_string()
}

/// Sort one raw update into its [`Update`] variant.
///
/// Payloads that are present but do not decode fall through to
/// [`Update::Unrecognized`].
pub fn classify(raw: RawUpdate) -> Update {
    if let Some(payload) = raw.payload.get("message") {
        return match serde_json::from_value::<Message>(payload.clone()) {
            Ok(message) if message.is_command() => Update::Command {
                name: command_name(message.text()),
                message,
            },
            Ok(message) => Update::Text(message),
            Err(e) => {
                tracing::warn!(update_id = raw.update_id, error = %e, "undecodable message payload");
                Update::Unrecognized(raw)
            }
        };
    }

    if let Some(payload) = raw.payload.get("callback_query") {
        return match serde_json::from_value::<CallbackQuery>(payload.clone()) {
            Ok(query) => Update::Callback(query),
            Err(e) => {
                tracing::warn!(update_id = raw.update_id, error = %e, "undecodable callback query");
                Update::Unrecognized(raw)
            }
        };
    }

    Update::Unrecognized(raw)
}
