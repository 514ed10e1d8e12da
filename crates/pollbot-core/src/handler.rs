//! Handler traits for user code.
//!
//! Each trait has a blanket impl for async functions / closures with the
//! matching argument list, so plain `async fn`s can be registered directly:
//!
//! ```ignore
//! async fn start(bot: Bot, msg: Message) -> HandlerResult {
//!     bot.send_message(msg.chat_id(), "hi").await?;
//!     respond()
//! }
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::{
    bot::Bot,
    messaging::types::{CallbackQuery, Message},
};

/// Result type of every user handler.
pub type HandlerResult = anyhow::Result<()>;

/// `Ok(())` with the error type pinned, for the tail of async closures.
pub fn respond() -> HandlerResult {
    Ok(())
}

/// Runs when a registered `/command` is received.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, bot: Bot, msg: Message) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(Bot, Message) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, bot: Bot, msg: Message) -> HandlerResult {
        self(bot, msg).await
    }
}

/// Receives plain text sent after a command that asked for follow-up input.
#[async_trait]
pub trait TextInputHandler: Send + Sync {
    async fn handle(&self, bot: Bot, text: String, msg: Message) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> TextInputHandler for F
where
    F: Fn(Bot, String, Message) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, bot: Bot, text: String, msg: Message) -> HandlerResult {
        self(bot, text, msg).await
    }
}

/// Pre-dispatch check run before every known command; `false` drops it.
#[async_trait]
pub trait CommandGate: Send + Sync {
    async fn allow(&self, bot: Bot, msg: Message) -> anyhow::Result<bool>;
}

#[async_trait]
impl<F, Fut> CommandGate for F
where
    F: Fn(Bot, Message) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send,
{
    async fn allow(&self, bot: Bot, msg: Message) -> anyhow::Result<bool> {
        self(bot, msg).await
    }
}

/// Action of an inline keyboard. Responsible for answering the callback.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    async fn handle(&self, bot: Bot, query: CallbackQuery) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> CallbackHandler for F
where
    F: Fn(Bot, CallbackQuery) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, bot: Bot, query: CallbackQuery) -> HandlerResult {
        self(bot, query).await
    }
}

/// Lifecycle event listener. `start` and `stop` carry no message.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, bot: Bot, msg: Option<Message>) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Bot, Option<Message>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, bot: Bot, msg: Option<Message>) -> HandlerResult {
        self(bot, msg).await
    }
}
