//! Joke source client
//!
//! One GET per joke against JokeAPI (or any endpoint returning a JSON body
//! with a `joke` string). No retries here; callers decide what a failure means.

use crate::error::{BotError, Result};
use crate::types::Joke;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::debug;

pub const JOKE_PREFIX: &str = "😂 ";
pub const MISSING_JOKE_TEXT: &str = "Joke not found 😅";

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[async_trait]
pub trait JokeSource: Send + Sync {
    async fn fetch(&self) -> Result<Joke>;
}

#[derive(Debug, Deserialize)]
struct JokeResponse {
    joke: Option<String>,
}

pub struct JokeApiClient {
    http: reqwest::Client,
    url: String,
}

impl JokeApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl JokeSource for JokeApiClient {
    async fn fetch(&self) -> Result<Joke> {
        let response = self
            .http
            .get(&self.url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| BotError::SourceUnavailable {
                message: format!("Failed to reach joke API: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(BotError::SourceUnavailable {
                message: format!("Joke API returned {}", response.status()),
            });
        }

        let body: JokeResponse =
            response
                .json()
                .await
                .map_err(|e| BotError::SourceUnavailable {
                    message: format!("Invalid joke API response: {}", e),
                })?;

        let joke = format_joke(body.joke);
        debug!(joke = %joke, "Fetched joke");
        Ok(joke)
    }
}

fn format_joke(text: Option<String>) -> Joke {
    let text = text.unwrap_or_else(|| MISSING_JOKE_TEXT.to_string());
    Joke(format!("{}{}", JOKE_PREFIX, text))
}
