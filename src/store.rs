//! Persistent bot state: the user registry and the seen-jokes ledger.
//!
//! Both collections live in small JSON files. Every operation is a full
//! read-modify-write under one process-wide lock, so interleaved handler
//! and scheduler calls never lose an update within this process.

use crate::error::{BotError, Result};
use crate::types::{Joke, LedgerFile, RegistryFile, UserId};
use crate::utils::json::{load_json, save_json};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub trait Store: Send + Sync {
    /// All registered users in registration order.
    fn get_users(&self) -> Result<Vec<UserId>>;

    /// Register a user. Returns `true` when the user was new.
    fn add_user(&self, user: UserId) -> Result<bool>;

    fn is_registered(&self, user: UserId) -> Result<bool> {
        Ok(self.get_users()?.contains(&user))
    }

    fn get_seen(&self, user: UserId) -> Result<Vec<Joke>>;

    /// Append a joke to the user's history. Returns `false`, leaving the
    /// history unchanged, when the joke is already there.
    fn record_seen(&self, user: UserId, joke: &Joke) -> Result<bool>;

    /// Forget the user's history.
    fn reset_seen(&self, user: UserId) -> Result<()>;
}

pub struct JsonStore {
    users_path: PathBuf,
    ledger_path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(users_path: impl Into<PathBuf>, ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            users_path: users_path.into(),
            ledger_path: ledger_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| BotError::Persistence {
            message: "state lock poisoned".to_string(),
        })
    }

    fn load_registry(&self) -> Result<RegistryFile> {
        load_json(&self.users_path, RegistryFile::default())
    }

    fn load_ledger(&self) -> Result<LedgerFile> {
        load_json(&self.ledger_path, LedgerFile::default())
    }
}

impl Store for JsonStore {
    fn get_users(&self) -> Result<Vec<UserId>> {
        let _guard = self.guard()?;
        Ok(self.load_registry()?.users)
    }

    fn add_user(&self, user: UserId) -> Result<bool> {
        let _guard = self.guard()?;
        let mut registry = self.load_registry()?;
        if registry.users.contains(&user) {
            return Ok(false);
        }

        registry.users.push(user);
        save_json(&self.users_path, &registry)?;
        debug!(%user, total = registry.users.len(), "Registered new user");
        Ok(true)
    }

    fn get_seen(&self, user: UserId) -> Result<Vec<Joke>> {
        let _guard = self.guard()?;
        Ok(self.load_ledger()?.seen(user))
    }

    fn record_seen(&self, user: UserId, joke: &Joke) -> Result<bool> {
        let _guard = self.guard()?;
        let mut ledger = self.load_ledger()?;
        let seen = ledger.entry(user);
        if seen.contains(joke) {
            return Ok(false);
        }

        seen.push(joke.clone());
        save_json(&self.ledger_path, &ledger)?;
        Ok(true)
    }

    fn reset_seen(&self, user: UserId) -> Result<()> {
        let _guard = self.guard()?;
        let mut ledger = self.load_ledger()?;
        ledger.entry(user).clear();
        save_json(&self.ledger_path, &ledger)
    }
}
