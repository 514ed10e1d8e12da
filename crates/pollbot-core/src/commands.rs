use std::{collections::HashMap, sync::Arc};

use crate::{
    errors::Error,
    handler::{CommandGate, CommandHandler, TextInputHandler},
    messaging::types::BotCommandInfo,
    Result,
};

/// Reserved name of the pre-dispatch gate; register it with
/// [`CommandRegistry::set_gate`] instead of as a command.
pub const ANY_COMMAND: &str = "<any>";

/// One `register(...)` call: names sharing a handler.
pub struct CommandSpec {
    names: Vec<String>,
    handler: Arc<dyn CommandHandler>,
    text_input: Option<Arc<dyn TextInputHandler>>,
    help: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(names: I, handler: impl CommandHandler + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            handler: Arc::new(handler),
            text_input: None,
            help: Vec::new(),
        }
    }

    /// Route the chat's following plain-text messages to `handler`.
    pub fn text_input(mut self, handler: impl TextInputHandler + 'static) -> Self {
        self.text_input = Some(Arc::new(handler));
        self
    }

    /// Help texts matched to names by position; missing positions use the first.
    pub fn help<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.help = texts.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone)]
pub struct CommandEntry {
    pub handler: Arc<dyn CommandHandler>,
    pub text_input: Option<Arc<dyn TextInputHandler>>,
    pub help: Option<String>,
}

#[derive(Default)]
pub struct CommandRegistry {
    entries: HashMap<String, CommandEntry>,
    order: Vec<String>,
    gate: Option<Arc<dyn CommandGate>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every name in `spec`; names are trimmed, re-registering replaces.
    pub fn register(&mut self, spec: CommandSpec) -> Result<()> {
        if spec.names.is_empty() {
            return Err(Error::Config("command registration needs at least one name".into()));
        }

        let names: Vec<String> = spec.names.iter().map(|n| n.trim().to_string()).collect();
        for name in &names {
            if name.is_empty() {
                return Err(Error::Config("command name must not be empty".into()));
            }
            if name == ANY_COMMAND {
                return Err(Error::Config(format!(
                    "{ANY_COMMAND} is reserved for the command gate, use set_gate"
                )));
            }
        }

        for (idx, name) in names.into_iter().enumerate() {
            let help = spec.help.get(idx).or(spec.help.first()).cloned();
            let entry = CommandEntry {
                handler: spec.handler.clone(),
                text_input: spec.text_input.clone(),
                help,
            };
            if self.entries.insert(name.clone(), entry).is_none() {
                self.order.push(name);
            }
        }
        Ok(())
    }

    pub fn set_gate(&mut self, gate: impl CommandGate + 'static) {
        self.gate = Some(Arc::new(gate));
    }

    pub fn gate(&self) -> Option<Arc<dyn CommandGate>> {
        self.gate.clone()
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn accepts_text_input(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| e.text_input.is_some())
    }

    pub fn text_input_for(&self, name: &str) -> Option<Arc<dyn TextInputHandler>> {
        self.entries.get(name).and_then(|e| e.text_input.clone())
    }

    /// Names in first-registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Command menu entries for every command that has help text.
    pub fn help_entries(&self) -> Vec<BotCommandInfo> {
        self.order
            .iter()
            .filter_map(|name| {
                let help = self.entries.get(name)?.help.as_ref()?;
                Some(BotCommandInfo {
                    command: name.to_lowercase(),
                    description: help.trim().to_string(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
