//! Core types for jokebot

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Telegram user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Emoji-prefixed joke text as delivered to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Joke(pub String);

impl Joke {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Joke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk shape of `users.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub users: Vec<UserId>,
}

/// On-disk shape of `used_jokes.json`. Keys are stringified user ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerFile(pub BTreeMap<String, Vec<Joke>>);

impl LedgerFile {
    pub fn seen(&self, user: UserId) -> Vec<Joke> {
        self.0.get(&user.to_string()).cloned().unwrap_or_default()
    }

    pub fn entry(&mut self, user: UserId) -> &mut Vec<Joke> {
        self.0.entry(user.to_string()).or_default()
    }
}

/// Summary of one broadcast run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastReport {
    pub delivered: Vec<UserId>,
    pub failed: Vec<(UserId, String)>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}
