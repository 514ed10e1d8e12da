use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, handler::CallbackHandler, Result};

/// Separates the input name from the button id inside `callback_data`.
pub const CALLBACK_SEPARATOR: char = '_';

/// Telegram rejects `callback_data` longer than this many bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Split `callback_data` on the first separator into `(input_name, input_data)`.
///
/// Data without a separator resolves to the whole string as the input name.
pub fn split_callback_data(data: &str) -> (&str, &str) {
    data.split_once(CALLBACK_SEPARATOR).unwrap_or((data, ""))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    /// A button whose `callback_id` gets namespaced once added to an input.
    pub fn new(text: impl Into<String>, callback_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_id.into(),
        }
    }
}

/// Wire form of `reply_markup` for inline keyboards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// What to do with a message's markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    /// Drop the markup entirely; an empty `inline_keyboard` is not sent.
    Remove,
}

impl ReplyMarkup {
    /// JSON for the `reply_markup` parameter, `None` when it must be omitted.
    pub fn to_param(&self) -> Result<Option<String>> {
        match self {
            ReplyMarkup::Inline(m) => Ok(Some(serde_json::to_string(m)?)),
            ReplyMarkup::Remove => Ok(None),
        }
    }
}

/// A named set of inline buttons plus the action run when one is pressed.
///
/// Every button's callback id is stored as `<name>_<id>` so a callback query
/// can be routed back to this input by name.
#[derive(Clone)]
pub struct InlineKeyboardInput {
    name: String,
    rows: Vec<Vec<InlineKeyboardButton>>,
    action: Option<Arc<dyn CallbackHandler>>,
}

impl std::fmt::Debug for InlineKeyboardInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineKeyboardInput")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

impl InlineKeyboardInput {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Config("inline keyboard name must not be empty".into()));
        }
        if name.contains(CALLBACK_SEPARATOR) {
            return Err(Error::Config(format!(
                "inline keyboard name {name:?} must not contain {CALLBACK_SEPARATOR:?}"
            )));
        }
        Ok(Self {
            name,
            rows: Vec::new(),
            action: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<InlineKeyboardButton>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn action(&self) -> Option<Arc<dyn CallbackHandler>> {
        self.action.clone()
    }

    pub fn set_action(&mut self, handler: impl CallbackHandler + 'static) {
        self.action = Some(Arc::new(handler));
    }

    pub fn with_action(mut self, handler: impl CallbackHandler + 'static) -> Self {
        self.set_action(handler);
        self
    }

    /// Append one row, namespacing each button's callback id.
    pub fn add_row(&mut self, buttons: Vec<InlineKeyboardButton>) -> Result<()> {
        let mut row = Vec::with_capacity(buttons.len());
        for b in buttons {
            let callback_data = format!("{}{CALLBACK_SEPARATOR}{}", self.name, b.callback_data);
            if callback_data.len() > MAX_CALLBACK_DATA_LEN {
                return Err(Error::Config(format!(
                    "callback data {callback_data:?} exceeds {MAX_CALLBACK_DATA_LEN} bytes"
                )));
            }
            row.push(InlineKeyboardButton {
                text: b.text,
                callback_data,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Result<Self> {
        self.add_row(buttons)?;
        Ok(self)
    }

    /// Remove every row; editing with the result clears the keyboard.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn markup(&self) -> ReplyMarkup {
        if self.rows.is_empty() {
            ReplyMarkup::Remove
        } else {
            ReplyMarkup::Inline(InlineKeyboardMarkup {
                inline_keyboard: self.rows.clone(),
            })
        }
    }
}

/// Most recently sent keyboard per input name.
#[derive(Default)]
pub struct KeyboardRegistry {
    inputs: HashMap<String, InlineKeyboardInput>,
}

impl KeyboardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `input`, replacing any earlier keyboard with the same name.
    pub fn register(&mut self, input: InlineKeyboardInput) {
        self.inputs.insert(input.name.clone(), input);
    }

    pub fn get(&self, name: &str) -> Option<&InlineKeyboardInput> {
        self.inputs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    /// Action bound to `name`, if the input is known and has one.
    pub fn action_for(&self, name: &str) -> Option<Arc<dyn CallbackHandler>> {
        self.inputs.get(name).and_then(|i| i.action.clone())
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
