//! firewatch - fire weather alert relay for Discord.
//!
//! Polls the National Weather Service active-alerts feed, relays new fire
//! weather alerts to a Discord channel, and answers `/test`, `/status`,
//! `/check` and `/active` slash commands over the Discord interactions
//! endpoint.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bot;
pub mod commands;
pub mod config;
pub mod discord;
pub mod error;
pub mod nws;
pub mod server;
pub mod task;

pub use bot::BotContext;
pub use config::BotConfig;
pub use error::{BotError, BotResult};
pub use nws::NwsClient;
