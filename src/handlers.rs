//! User interaction handlers: `/start` and the "another joke" button.

use crate::error::Result;
use crate::selector::Selector;
use crate::telegram::{
    parse_command, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Messenger,
    TelegramMessage, TelegramUpdate,
};
use crate::types::{Joke, UserId};
use crate::utils::truncate;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ANOTHER_JOKE_DATA: &str = "another_joke";
pub const FAILURE_TEXT: &str = "😕 Couldn't fetch a joke right now. Please try again in a moment.";

pub fn joke_keyboard(site_url: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton::callback("😂 Another Joke", ANOTHER_JOKE_DATA),
            InlineKeyboardButton::url("🌐 Open Site", site_url),
        ]],
    }
}

pub fn welcome_text(joke: &Joke) -> String {
    format!("🔥 Welcome! Here's your fresh joke:\n\n{}", joke)
}

pub struct Handlers {
    selector: Selector,
    messenger: Arc<dyn Messenger>,
    keyboard: InlineKeyboardMarkup,
}

impl Handlers {
    pub fn new(selector: Selector, messenger: Arc<dyn Messenger>, site_url: &str) -> Self {
        Self {
            selector,
            messenger,
            keyboard: joke_keyboard(site_url),
        }
    }

    /// Route one inbound update. Anything other than `/start` or the
    /// another-joke button is ignored.
    pub async fn handle_update(&self, update: &TelegramUpdate) -> Result<()> {
        if let Some(query) = &update.callback_query {
            return self.handle_callback(query).await;
        }

        if let Some(message) = &update.message {
            return self.handle_message(message).await;
        }

        debug!(update_id = update.update_id, "Update without message, skipping");
        Ok(())
    }

    async fn handle_message(&self, message: &TelegramMessage) -> Result<()> {
        let Some(from) = &message.from else {
            return Ok(());
        };

        match message.text.as_deref().and_then(parse_command) {
            Some("start") => self.on_start(UserId(from.id), message.chat.id).await,
            _ => Ok(()),
        }
    }

    async fn handle_callback(&self, query: &CallbackQuery) -> Result<()> {
        if query.data.as_deref() == Some(ANOTHER_JOKE_DATA) {
            return self.on_request_another(query).await;
        }

        debug!(data = ?query.data, "Unknown callback data");
        self.messenger.answer_callback(&query.id).await
    }

    /// Register the user if new, then greet them with a joke.
    pub async fn on_start(&self, user: UserId, chat_id: i64) -> Result<()> {
        if self.selector.store().add_user(user)? {
            info!(%user, "New user registered");
        }

        match self.selector.select(user).await {
            Ok(selection) => {
                info!(
                    %user,
                    reset = selection.was_reset(),
                    joke = %truncate(selection.joke().as_str(), 50),
                    "Sending welcome joke"
                );
                self.messenger
                    .send_message(chat_id, &welcome_text(selection.joke()), Some(&self.keyboard))
                    .await
            }
            Err(e) => {
                if let Err(send_err) = self.messenger.send_message(chat_id, FAILURE_TEXT, None).await {
                    warn!(%user, "Failed to send failure notice: {}", send_err);
                }
                Err(e)
            }
        }
    }

    /// Acknowledge the button press, then replace the message with a new joke.
    pub async fn on_request_another(&self, query: &CallbackQuery) -> Result<()> {
        let user = UserId(query.from.id);

        if let Err(e) = self.messenger.answer_callback(&query.id).await {
            warn!(%user, "Failed to answer callback query: {}", e);
        }

        let (text, result) = match self.selector.select(user).await {
            Ok(selection) => (selection.into_joke().0, Ok(())),
            Err(e) => (FAILURE_TEXT.to_string(), Err(e)),
        };

        match &query.message {
            Some(message) => {
                self.messenger
                    .edit_message(
                        message.chat.id,
                        message.message_id,
                        &text,
                        Some(&self.keyboard),
                    )
                    .await?
            }
            None => {
                self.messenger
                    .send_message(user.0, &text, Some(&self.keyboard))
                    .await?
            }
        }

        result
    }
}
