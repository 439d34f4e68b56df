//! Configuration for jokebot
//!
//! Everything is read from the environment (a `.env` file is loaded first
//! when present). Accessors fall back to defaults; only the bot token is
//! mandatory.

use crate::error::{BotError, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_JOKE_API_URL: &str = "https://v2.jokeapi.dev/joke/Any?type=single&safe-mode";
pub const DEFAULT_SITE_URL: &str = "https://sprightly-dasik-9939a7.netlify.app/";
/// Daily at 09:00:00 (seconds-first cron format).
pub const DEFAULT_BROADCAST_CRON: &str = "0 0 9 * * *";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

pub fn load_dotenv() {
    // A missing .env is the normal case in production.
    let _ = dotenvy::dotenv();
}

pub fn bot_token() -> Result<String> {
    env::var("BOT_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| BotError::Config {
            message: "BOT_TOKEN not set".to_string(),
        })
}

pub fn data_dir() -> PathBuf {
    env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn users_path() -> PathBuf {
    data_dir().join("users.json")
}

pub fn used_jokes_path() -> PathBuf {
    data_dir().join("used_jokes.json")
}

pub fn joke_api_url() -> String {
    env::var("JOKE_API_URL").unwrap_or_else(|_| DEFAULT_JOKE_API_URL.to_string())
}

pub fn site_url() -> String {
    env::var("SITE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.to_string())
}

/// Public base URL for webhook mode. `None` selects long polling.
pub fn webhook_url() -> Option<String> {
    env::var("WEBHOOK_URL")
        .ok()
        .or_else(|| {
            env::var("RAILWAY_PUBLIC_DOMAIN")
                .ok()
                .map(|domain| format!("https://{}", domain))
        })
        .filter(|u| !u.trim().is_empty())
        .map(|u| u.trim_end_matches('/').to_string())
}

pub fn webhook_path() -> String {
    env::var("WEBHOOK_PATH")
        .map(|p| p.trim_matches('/').to_string())
        .unwrap_or_else(|_| "webhook".to_string())
}

pub fn bind_addr() -> SocketAddr {
    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    SocketAddr::from(([0, 0, 0, 0], port))
}

pub fn poll_timeout() -> Duration {
    let secs = env::var("POLL_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

pub fn broadcast_enabled() -> bool {
    env::var("BROADCAST_ENABLED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(true)
}

pub fn broadcast_cron() -> String {
    env::var("BROADCAST_CRON").unwrap_or_else(|_| DEFAULT_BROADCAST_CRON.to_string())
}

pub fn broadcast_offset() -> Result<FixedOffset> {
    match env::var("BROADCAST_UTC_OFFSET") {
        Ok(raw) => parse_utc_offset(&raw),
        Err(_) => Ok(utc()),
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse `+HH:MM`, `-HH:MM` or `Z` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let invalid = || BotError::Config {
        message: format!("Invalid UTC offset '{}', expected +HH:MM", raw),
    };

    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours = two_digits(hours).ok_or_else(invalid)?;
    let minutes = two_digits(minutes).ok_or_else(invalid)?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    let seconds = (hours * 3600 + minutes * 60) as i32;
    FixedOffset::east_opt(sign * seconds).ok_or_else(invalid)
}

/// Exactly two ASCII digits; `u32::from_str` alone would accept a `+` sign.
fn two_digits(part: &str) -> Option<u32> {
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Startup settings, resolved once.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub users_path: PathBuf,
    pub used_jokes_path: PathBuf,
    pub joke_api_url: String,
    pub site_url: String,
    pub webhook_url: Option<String>,
    pub webhook_path: String,
    pub bind_addr: SocketAddr,
    pub poll_timeout: Duration,
    pub broadcast_enabled: bool,
    pub broadcast_cron: String,
    pub broadcast_offset: FixedOffset,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: bot_token()?,
            users_path: users_path(),
            used_jokes_path: used_jokes_path(),
            joke_api_url: joke_api_url(),
            site_url: site_url(),
            webhook_url: webhook_url(),
            webhook_path: webhook_path(),
            bind_addr: bind_addr(),
            poll_timeout: poll_timeout(),
            broadcast_enabled: broadcast_enabled(),
            broadcast_cron: broadcast_cron(),
            broadcast_offset: broadcast_offset()?,
        })
    }
}
