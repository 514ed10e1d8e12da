//! Long-polling loop and update dispatch.
//!
//! The loop is a small state machine:
//!
//! ```text
//! Starting -> Fetching <-> Dispatching
//!                 \
//!                  -> Stopped   (on cancellation)
//! ```
//!
//! One fetch, then at most one update is fully routed before the next fetch,
//! so handlers run strictly in arrival order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    bot::Bot,
    commands::{CommandRegistry, CommandSpec},
    config::Config,
    cursor::{UpdateCursor, SEED_OFFSET},
    errors::Error,
    events::{BotEvent, EventBus},
    handler::{CommandGate, EventHandler},
    messaging::{
        port::BotApi,
        types::{ApiReply, BotCommandInfo, CallbackQuery, Message, RawUpdate},
    },
    update::{classify, Update},
    Result,
};

/// Setup-time registrations, frozen once polling starts.
#[derive(Default)]
struct Routes {
    commands: CommandRegistry,
    events: EventBus,
}

#[derive(Debug)]
enum PollState {
    Starting,
    Fetching,
    Dispatching(RawUpdate),
    Stopped,
}

/// Owns every registry and the update cursor; drives the polling loop.
pub struct Engine {
    bot: Bot,
    cfg: Arc<Config>,
    routes: Routes,
    cursor: UpdateCursor,
}

impl Engine {
    pub fn new(api: Arc<dyn BotApi>, cfg: Arc<Config>) -> Self {
        Self {
            bot: Bot::new(api, cfg.clone()),
            cfg,
            routes: Routes::default(),
            cursor: UpdateCursor::new(),
        }
    }

    /// Handle for sending messages outside of handlers.
    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub fn cursor(&self) -> UpdateCursor {
        self.cursor
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.routes.commands
    }

    pub fn register_command(&mut self, spec: CommandSpec) -> Result<()> {
        self.routes.commands.register(spec)
    }

    /// Install the `<any>` gate consulted before every known command.
    pub fn register_gate(&mut self, gate: impl CommandGate + 'static) {
        self.routes.commands.set_gate(gate);
    }

    /// Listen for a lifecycle event by name; unknown names are a config error.
    pub fn on_event(&mut self, name: &str, handler: impl EventHandler + 'static) -> Result<()> {
        self.routes.events.on(name, handler)
    }

    pub fn on(&mut self, event: BotEvent, handler: impl EventHandler + 'static) {
        self.routes.events.on_event(event, handler);
    }

    /// Publish the command menu: `explicit` if given, else every command with help text.
    pub async fn set_bot_commands_info(
        &self,
        explicit: Option<Vec<BotCommandInfo>>,
    ) -> Result<ApiReply<bool>> {
        let info = explicit.unwrap_or_else(|| self.routes.commands.help_entries());
        self.bot.set_my_commands(&info).await
    }

    pub async fn delete_bot_commands_info(&self) -> Result<ApiReply<bool>> {
        self.bot.delete_my_commands().await
    }

    /// Position the cursor right after the most recent pending update, so
    /// the backlog accumulated while offline is skipped.
    pub async fn seed_cursor(&mut self) -> Result<()> {
        let reply = self
            .bot
            .get_updates(SEED_OFFSET, std::time::Duration::ZERO, 1)
            .await?;
        if let ApiReply::Ok(batch) = reply {
            self.cursor.advance(&batch);
        }
        debug!(offset = self.cursor.offset(), "cursor seeded");
        Ok(())
    }

    /// Fetch once at the current cursor. The cursor only moves on success.
    async fn fetch(&mut self) -> Result<Vec<RawUpdate>> {
        let reply = self
            .bot
            .get_updates(self.cursor.offset(), self.cfg.poll_timeout, self.cfg.poll_limit)
            .await?;
        match reply {
            ApiReply::Ok(batch) => {
                self.cursor.advance(&batch);
                Ok(batch)
            }
            ApiReply::Rejected(raw) => Err(Error::External(format!(
                "getUpdates rejected: {}",
                raw.get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or("no description")
            ))),
        }
    }

    /// Poll until `shutdown` is cancelled, then emit `stop` and return.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let routes = Arc::new(std::mem::take(&mut self.routes));
        let mut failures: u32 = 0;
        let mut state = PollState::Starting;

        loop {
            state = match state {
                PollState::Starting => {
                    let seeded = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => None,
                        res = self.seed_cursor() => Some(res),
                    };

                    match seeded {
                        None => PollState::Stopped,
                        Some(res) => {
                            if let Err(e) = res {
                                warn!(error = %e, "could not seed update cursor, starting from current offset");
                            }
                            if let Err(e) = routes.events.emit(&self.bot, BotEvent::Start, None).await {
                                error!(error = %e, "start listener failed");
                            }
                            info!(offset = self.cursor.offset(), "polling started");
                            PollState::Fetching
                        }
                    }
                }

                PollState::Fetching => {
                    let fetched = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => None,
                        res = self.fetch() => Some(res),
                    };

                    match fetched {
                        None => PollState::Stopped,
                        Some(Ok(batch)) => {
                            failures = 0;
                            match batch.into_iter().next() {
                                Some(head) => PollState::Dispatching(head),
                                None => PollState::Fetching,
                            }
                        }
                        Some(Err(e)) => {
                            failures = failures.saturating_add(1);
                            if e.is_retryable() {
                                warn!(error = %e, failures, "fetching updates failed");
                            } else {
                                error!(error = %e, failures, "unexpected getUpdates failure, retrying");
                            }
                            if let Some(backoff) = self.cfg.retry_backoff {
                                let delay = backoff.delay(failures);
                                tokio::select! {
                                    biased;
                                    _ = shutdown.cancelled() => {}
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            }
                            PollState::Fetching
                        }
                    }
                }

                PollState::Dispatching(raw) => {
                    let update_id = raw.update_id;
                    let task = tokio::spawn(dispatch(routes.clone(), self.bot.clone(), classify(raw)));
                    match task.await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!(update_id, error = %e, "update dispatch failed"),
                        Err(join) if join.is_panic() => {
                            error!(update_id, "handler panicked while dispatching update")
                        }
                        Err(join) => error!(update_id, error = %join, "dispatch task aborted"),
                    }
                    if shutdown.is_cancelled() {
                        PollState::Stopped
                    } else {
                        PollState::Fetching
                    }
                }

                PollState::Stopped => {
                    if let Err(e) = routes.events.emit(&self.bot, BotEvent::Stop, None).await {
                        error!(error = %e, "stop listener failed");
                    }
                    info!(offset = self.cursor.offset(), "polling stopped");
                    return Ok(());
                }
            };
        }
    }
}

/// Route one classified update.
async fn dispatch(routes: Arc<Routes>, bot: Bot, update: Update) -> Result<()> {
    debug!(kind = update.kind(), "dispatching update");
    match update {
        Update::Command { name, message } => dispatch_command(&routes, &bot, name, message).await,
        Update::Text(message) => dispatch_text(&routes, &bot, message).await,
        Update::Callback(query) => dispatch_callback(&bot, query).await,
        Update::Unrecognized(raw) => {
            debug!(update_id = raw.update_id, "ignoring unrecognized update");
            Ok(())
        }
    }
}

async fn dispatch_command(routes: &Routes, bot: &Bot, name: String, message: Message) -> Result<()> {
    routes
        .events
        .emit(bot, BotEvent::NewMessage, Some(&message))
        .await?;
    routes
        .events
        .emit(bot, BotEvent::NewCommand, Some(&message))
        .await?;

    let Some(entry) = routes.commands.get(&name).cloned() else {
        debug!(command = %name, "unknown command");
        return routes
            .events
            .emit(bot, BotEvent::IncorrectCommand, Some(&message))
            .await;
    };

    if let Some(gate) = routes.commands.gate() {
        let allowed = gate
            .allow(bot.clone(), message.clone())
            .await
            .map_err(|e| Error::Handler(format!("command gate failed: {e:#}")))?;
        if !allowed {
            debug!(command = %name, "command blocked by gate");
            return Ok(());
        }
    }

    let chat_id = message.chat_id();
    entry
        .handler
        .handle(bot.clone(), message)
        .await
        .map_err(|e| Error::Handler(format!("/{name} failed: {e:#}")))?;

    bot.sessions()
        .lock()
        .await
        .record(chat_id, name, entry.text_input.is_some());
    Ok(())
}

async fn dispatch_text(routes: &Routes, bot: &Bot, message: Message) -> Result<()> {
    routes
        .events
        .emit(bot, BotEvent::NewMessage, Some(&message))
        .await?;

    let awaiting = bot
        .sessions()
        .lock()
        .await
        .awaiting_text(message.chat_id())
        .map(str::to_string);

    let continuation = awaiting
        .as_deref()
        .and_then(|name| routes.commands.text_input_for(name).map(|h| (name, h)));

    match continuation {
        Some((name, handler)) => {
            debug!(command = %name, chat_id = %message.chat_id(), "routing text to continuation");
            let text = message.text().to_string();
            handler
                .handle(bot.clone(), text, message)
                .await
                .map_err(|e| Error::Handler(format!("/{name} text input failed: {e:#}")))
        }
        None => {
            routes
                .events
                .emit(bot, BotEvent::NewTextMessage, Some(&message))
                .await
        }
    }
}

async fn dispatch_callback(bot: &Bot, query: CallbackQuery) -> Result<()> {
    let action = bot.keyboards().lock().await.action_for(&query.input_name);

    match action {
        Some(action) => {
            let input = query.input_name.clone();
            action
                .handle(bot.clone(), query)
                .await
                .map_err(|e| Error::Handler(format!("keyboard {input:?} action failed: {e:#}")))
        }
        None => {
            debug!(input = %query.input_name, "no keyboard action, acknowledging callback");
            bot.answer(&query).await?;
            Ok(())
        }
    }
}
