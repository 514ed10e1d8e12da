use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use crate::{
    bot::Bot,
    errors::Error,
    handler::EventHandler,
    messaging::types::Message,
    Result,
};

/// Lifecycle points a single listener can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BotEvent {
    /// Polling is about to begin.
    Start,
    /// Any message update (text or command).
    NewMessage,
    /// Plain text that no text-input continuation consumed.
    NewTextMessage,
    /// Any `/command` message, known or not.
    NewCommand,
    /// Polling was cancelled.
    Stop,
    /// A `/command` with no registered handler.
    IncorrectCommand,
}

impl BotEvent {
    pub const ALL: [BotEvent; 6] = [
        BotEvent::Start,
        BotEvent::NewMessage,
        BotEvent::NewTextMessage,
        BotEvent::NewCommand,
        BotEvent::Stop,
        BotEvent::IncorrectCommand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BotEvent::Start => "start",
            BotEvent::NewMessage => "new_message",
            BotEvent::NewTextMessage => "new_text_message",
            BotEvent::NewCommand => "new_command",
            BotEvent::Stop => "stop",
            BotEvent::IncorrectCommand => "incorrect_command",
        }
    }
}

impl fmt::Display for BotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BotEvent::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = BotEvent::ALL.iter().map(|e| e.as_str()).collect();
                Error::Config(format!(
                    "invalid event name {s:?}, expected one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// One optional listener per [`BotEvent`]; registering again replaces it.
#[derive(Default)]
pub struct EventBus {
    slots: HashMap<BotEvent, Arc<dyn EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind by name; unknown names fail here rather than at emit time.
    pub fn on(&mut self, name: &str, handler: impl EventHandler + 'static) -> Result<()> {
        let event = name.parse::<BotEvent>()?;
        self.on_event(event, handler);
        Ok(())
    }

    pub fn on_event(&mut self, event: BotEvent, handler: impl EventHandler + 'static) {
        self.slots.insert(event, Arc::new(handler));
    }

    pub fn is_bound(&self, event: BotEvent) -> bool {
        self.slots.contains_key(&event)
    }

    /// Run the listener for `event`, if any.
    pub async fn emit(&self, bot: &Bot, event: BotEvent, payload: Option<&Message>) -> Result<()> {
        let Some(handler) = self.slots.get(&event).cloned() else {
            return Ok(());
        };
        tracing::debug!(event = %event, "emitting event");
        handler
            .handle(bot.clone(), payload.cloned())
            .await
            .map_err(|e| Error::Handler(format!("{event} listener failed: {e:#}")))
    }
}
