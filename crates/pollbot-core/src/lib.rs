//! Core polling + dispatch engine for a Telegram Bot API long-polling bot.
//!
//! This crate is intentionally transport-agnostic. The HTTP client lives behind
//! the [`messaging::port::BotApi`] port, implemented in adapter crates.

pub mod bot;
pub mod commands;
pub mod config;
pub mod cursor;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod events;
pub mod formatting;
pub mod handler;
pub mod logging;
pub mod messaging;
pub mod session;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
