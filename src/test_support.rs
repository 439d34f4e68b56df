//! Fakes shared by unit tests.

use crate::error::{BotError, Result};
use crate::jokes::{JokeSource, JOKE_PREFIX};
use crate::telegram::{InlineKeyboardMarkup, Messenger};
use crate::types::Joke;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns the given jokes in order, wrapping around forever.
pub struct CyclingSource {
    jokes: Vec<String>,
    calls: AtomicUsize,
    yield_first: bool,
}

impl CyclingSource {
    pub fn new(jokes: &[&str]) -> Self {
        Self {
            jokes: jokes.iter().map(|j| j.to_string()).collect(),
            calls: AtomicUsize::new(0),
            yield_first: false,
        }
    }

    /// Suspend once inside every fetch, like a real network call, so
    /// joined selections interleave.
    pub fn yielding(mut self) -> Self {
        self.yield_first = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JokeSource for CyclingSource {
    async fn fetch(&self) -> Result<Joke> {
        if self.yield_first {
            tokio::task::yield_now().await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = &self.jokes[n % self.jokes.len()];
        Ok(Joke(format!("{}{}", JOKE_PREFIX, text)))
    }
}

pub struct FailingSource;

#[async_trait]
impl JokeSource for FailingSource {
    async fn fetch(&self) -> Result<Joke> {
        Err(BotError::SourceUnavailable {
            message: "connection refused".to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Sent {
        chat_id: i64,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Edited {
        chat_id: i64,
        message_id: i64,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Answered {
        callback_id: String,
    },
}

/// Records every outbound call; sends to chats in `blocked` fail.
#[derive(Default)]
pub struct RecordingMessenger {
    calls: Mutex<Vec<Outbound>>,
    blocked: HashSet<i64>,
}

impl RecordingMessenger {
    pub fn blocking(chats: &[i64]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            blocked: chats.iter().copied().collect(),
        }
    }

    pub fn calls(&self) -> Vec<Outbound> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        if self.blocked.contains(&chat_id) {
            return Err(BotError::Telegram {
                message: "sendMessage failed: Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.calls.lock().unwrap().push(Outbound::Sent {
            chat_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Outbound::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Outbound::Answered {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }
}
