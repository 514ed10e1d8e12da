use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::keyboard::split_callback_data,
    Result,
};

/// Entity type Telegram uses to mark `/command` spans.
pub const BOT_COMMAND_ENTITY: &str = "bot_command";

/// One element of a `getUpdates` result, before classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawUpdate {
    pub update_id: i64,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: Option<bool>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub length: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Option<Vec<MessageEntity>>,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
}

impl Message {
    pub fn chat_id(&self) -> ChatId {
        self.chat.id
    }

    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }

    /// Message text, or an empty string for non-text messages.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// True when the first entity marks a `/command`.
    pub fn is_command(&self) -> bool {
        self.entities
            .as_ref()
            .and_then(|e| e.first())
            .is_some_and(|e| e.kind == BOT_COMMAND_ENTITY)
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}

/// Callback query with its `data` already split into input name and input data.
#[derive(Clone, Debug, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: String,
    pub input_name: String,
    pub input_data: String,
}

#[derive(Deserialize)]
struct WireCallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}

impl<'de> Deserialize<'de> for CallbackQuery {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let wire = WireCallbackQuery::deserialize(d)?;
        let data = wire.data.unwrap_or_default();
        let (input_name, input_data) = split_callback_data(&data);
        Ok(Self {
            input_name: input_name.to_string(),
            input_data: input_data.to_string(),
            id: wire.id,
            from: wire.from,
            message: wire.message,
            data,
        })
    }
}

impl CallbackQuery {
    /// Chat the originating message lives in, falling back to the sender's private chat.
    pub fn chat_id(&self) -> ChatId {
        self.message
            .as_ref()
            .map(Message::chat_id)
            .unwrap_or_else(|| self.from.id.into())
    }
}

/// One entry of the bot command menu (`setMyCommands`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommandInfo {
    pub command: String,
    pub description: String,
}

/// Outcome of a Bot API call.
///
/// `ok: false` is not an error: the raw response is handed back so callers can
/// inspect `description` / `error_code` and decide.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiReply<T> {
    Ok(T),
    Rejected(serde_json::Value),
}

impl<T> ApiReply<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ApiReply::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ApiReply::Ok(v) => Some(v),
            ApiReply::Rejected(_) => None,
        }
    }

    /// Telegram's human-readable reason for a rejection.
    pub fn rejection_description(&self) -> Option<&str> {
        match self {
            ApiReply::Ok(_) => None,
            ApiReply::Rejected(raw) => raw.get("description").and_then(|d| d.as_str()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiReply<U> {
        match self {
            ApiReply::Ok(v) => ApiReply::Ok(f(v)),
            ApiReply::Rejected(raw) => ApiReply::Rejected(raw),
        }
    }
}

/// Split a raw Bot API response into a typed result or the raw rejection.
pub fn decode_reply<T: DeserializeOwned>(raw: serde_json::Value) -> Result<ApiReply<T>> {
    let ok = raw.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if !ok {
        return Ok(ApiReply::Rejected(raw));
    }
    let result = match raw {
        serde_json::Value::Object(mut map) => {
            map.remove("result").unwrap_or(serde_json::Value::Null)
        }
        _ => serde_json::Value::Null,
    };
    Ok(ApiReply::Ok(serde_json::from_value(result)?))
}
