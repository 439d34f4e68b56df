//! Unique joke selection
//!
//! JokeAPI has no "exclude these" parameter, so uniqueness is enforced here
//! by polling the source and filtering against the user's history:
//!
//! ```text
//! Searching(0) -> Searching(n) -> Found
//!                      |
//!                  (n == max) -> Exhausted -> Reset -> Retried
//! ```
//!
//! Source failures abort the selection in any state; only duplicates are
//! retried.

use crate::error::Result;
use crate::jokes::JokeSource;
use crate::store::Store;
use crate::types::{Joke, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// Fetch attempts before the user's history is considered exhausted.
pub const MAX_ATTEMPTS: usize = 20;

/// Result of a selection, distinguishing a normal hit from the reset fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Fresh(Joke),
    AfterReset(Joke),
}

impl Selection {
    pub fn joke(&self) -> &Joke {
        match self {
            Selection::Fresh(joke) | Selection::AfterReset(joke) => joke,
        }
    }

    pub fn into_joke(self) -> Joke {
        match self {
            Selection::Fresh(joke) | Selection::AfterReset(joke) => joke,
        }
    }

    pub fn was_reset(&self) -> bool {
        matches!(self, Selection::AfterReset(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectState {
    Searching { attempt: usize, seen: Vec<Joke> },
    Found(Joke),
    Exhausted,
    Reset,
    Retried(Joke),
}

#[derive(Clone)]
pub struct Selector {
    source: Arc<dyn JokeSource>,
    store: Arc<dyn Store>,
    max_attempts: usize,
}

impl Selector {
    pub fn new(source: Arc<dyn JokeSource>, store: Arc<dyn Store>) -> Self {
        Self {
            source,
            store,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Pick a joke `user` has not seen, recording it in their history.
    pub async fn select(&self, user: UserId) -> Result<Selection> {
        let mut state = SelectState::Searching {
            attempt: 0,
            seen: self.store.get_seen(user)?,
        };

        loop {
            state = match state {
                SelectState::Found(joke) => return Ok(Selection::Fresh(joke)),
                SelectState::Retried(joke) => return Ok(Selection::AfterReset(joke)),
                other => self.step(user, other).await?,
            };
        }
    }

    async fn step(&self, user: UserId, state: SelectState) -> Result<SelectState> {
        match state {
            SelectState::Searching { attempt, .. } if attempt >= self.max_attempts => {
                Ok(SelectState::Exhausted)
            }
            SelectState::Searching { attempt, mut seen } => {
                let joke = self.source.fetch().await?;
                if seen.contains(&joke) {
                    debug!(%user, attempt, "Joke already seen, retrying");
                } else if self.store.record_seen(user, &joke)? {
                    return Ok(SelectState::Found(joke));
                } else {
                    // Recorded by an overlapping selection since `seen` was loaded.
                    debug!(%user, attempt, "Joke taken concurrently, retrying");
                    seen.push(joke);
                }
                Ok(SelectState::Searching {
                    attempt: attempt + 1,
                    seen,
                })
            }
            SelectState::Exhausted => {
                info!(
                    %user,
                    attempts = self.max_attempts,
                    "No unseen joke found, resetting history"
                );
                self.store.reset_seen(user)?;
                Ok(SelectState::Reset)
            }
            SelectState::Reset => {
                let joke = self.source.fetch().await?;
                self.store.record_seen(user, &joke)?;
                Ok(SelectState::Retried(joke))
            }
            terminal @ (SelectState::Found(_) | SelectState::Retried(_)) => Ok(terminal),
        }
    }
}
