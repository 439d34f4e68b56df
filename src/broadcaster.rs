//! Daily broadcast - pushes one unseen joke to every registered user
//!
//! The schedule is a seconds-first cron expression (e.g. `0 0 9 * * *` for
//! daily at 9am) evaluated in a fixed UTC offset. Each tick walks the
//! registry in order; a failure for one user is logged and recorded, and the
//! batch carries on.

use crate::error::{BotError, Result};
use crate::handlers::joke_keyboard;
use crate::selector::Selector;
use crate::telegram::{InlineKeyboardMarkup, Messenger};
use crate::types::{BroadcastReport, Joke, UserId};
use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{error, info, warn};

pub fn daily_text(joke: &Joke) -> String {
    format!("🌞 Your daily joke:\n\n{}", joke)
}

#[derive(Clone)]
pub struct Broadcaster {
    selector: Selector,
    messenger: Arc<dyn Messenger>,
    keyboard: InlineKeyboardMarkup,
}

impl Broadcaster {
    pub fn new(selector: Selector, messenger: Arc<dyn Messenger>, site_url: &str) -> Self {
        Self {
            selector,
            messenger,
            keyboard: joke_keyboard(site_url),
        }
    }

    /// Send one unique joke to every registered user.
    pub async fn broadcast_all(&self) -> Result<BroadcastReport> {
        let started = Instant::now();
        let users = self.selector.store().get_users()?;
        info!(users = users.len(), "Starting daily broadcast");

        let mut report = BroadcastReport::default();
        for user in users {
            match self.deliver(user).await {
                Ok(()) => report.delivered.push(user),
                Err(e) => {
                    warn!(%user, error = %e, "Daily joke not delivered");
                    report.failed.push((user, e.to_string()));
                }
            }
        }

        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            took = %format_duration(started.elapsed().as_millis() as i64),
            "Daily broadcast finished"
        );
        Ok(report)
    }

    async fn deliver(&self, user: UserId) -> Result<()> {
        let joke = self.selector.select(user).await?.into_joke();
        self.messenger
            .send_message(user.0, &daily_text(&joke), Some(&self.keyboard))
            .await
            .map_err(|e| BotError::DeliveryFailed {
                user,
                message: e.to_string(),
            })
    }
}

/// Cron schedule pinned to a fixed offset.
#[derive(Debug, Clone)]
pub struct DailySchedule {
    schedule: Schedule,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(cron_expr: &str, offset: FixedOffset) -> Result<Self> {
        Ok(Self {
            schedule: parse_cron_expression(cron_expr)?,
            offset,
        })
    }

    /// First fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&now.with_timezone(&self.offset))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

/// Sleeps until each scheduled time and runs a broadcast.
pub struct BroadcastScheduler {
    broadcaster: Broadcaster,
    schedule: DailySchedule,
}

impl BroadcastScheduler {
    pub fn new(broadcaster: Broadcaster, schedule: DailySchedule) -> Self {
        Self {
            broadcaster,
            schedule,
        }
    }

    /// Run the scheduler loop
    pub async fn run(self) -> Result<()> {
        loop {
            let now = Utc::now();
            let next = self
                .schedule
                .next_after(now)
                .ok_or_else(|| BotError::Scheduler {
                    message: "Cron schedule has no upcoming run".to_string(),
                })?;
            let wait = wait_until(now, next);

            info!(
                next_run = %next.with_timezone(&self.schedule.offset).to_rfc3339(),
                wait = %format_duration(wait.as_millis() as i64),
                "Next daily broadcast scheduled"
            );
            tokio::time::sleep(wait).await;

            if let Err(e) = self.broadcaster.broadcast_all().await {
                error!("Daily broadcast aborted: {}", e);
            }
        }
    }
}

/// Parse cron expression
pub fn parse_cron_expression(expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).map_err(|e| BotError::Scheduler {
        message: format!("Invalid cron expression '{}': {}", expr, e),
    })
}

pub fn wait_until(now: DateTime<Utc>, next: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Format duration for logging
pub fn format_duration(duration_ms: i64) -> String {
    if duration_ms < 1000 {
        format!("{}ms", duration_ms)
    } else if duration_ms < 60000 {
        format!("{}s", duration_ms / 1000)
    } else if duration_ms < 3_600_000 {
        format!("{}m", duration_ms / 60000)
    } else {
        format!("{}h{}m", duration_ms / 3_600_000, (duration_ms % 3_600_000) / 60000)
    }
}
