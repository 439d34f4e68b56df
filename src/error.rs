//! Error handling for jokebot

use crate::types::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Joke source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Delivery to user {user} failed: {message}")]
    DeliveryFailed { user: UserId, message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Telegram error: {message}")]
    Telegram { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Scheduler error: {message}")]
    Scheduler { message: String },
}

pub type Result<T> = std::result::Result<T, BotError>;

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Persistence {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Persistence {
            message: e.to_string(),
        }
    }
}
