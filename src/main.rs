//! jokebot - Telegram bot serving fresh jokes
//!
//! Serves a joke on `/start` and on every "another joke" press, never
//! repeating one a user has already seen, and optionally pushes a daily
//! joke to everyone who ever started the bot.

mod broadcaster;
mod config;
mod error;
mod handlers;
mod jokes;
mod logging;
mod selector;
mod store;
mod telegram;
#[cfg(test)]
mod test_support;
mod types;
mod utils;

use error::Result;

use broadcaster::{BroadcastScheduler, Broadcaster, DailySchedule};
use config::Settings;
use handlers::Handlers;
use jokes::JokeApiClient;
use logging::LoggingConfig;
use selector::Selector;
use std::sync::Arc;
use store::JsonStore;
use structopt::StructOpt;
use telegram::TelegramClient;
use tracing::{error, info};

#[derive(StructOpt, Debug)]
struct Args {
    #[structopt(short, long, default_value = "info")]
    log_level: String,

    /// Run one broadcast immediately and exit
    #[structopt(long)]
    broadcast_now: bool,

    /// Do not start the daily broadcast scheduler
    #[structopt(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    let args = Args::from_args();

    logging::init_with_config(LoggingConfig::with_level(&args.log_level));

    info!("Starting jokebot v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_env()?;

    let store = Arc::new(JsonStore::new(
        settings.users_path.clone(),
        settings.used_jokes_path.clone(),
    ));
    info!(
        users = %store.users_path().display(),
        seen = %store.ledger_path().display(),
        "Using state files"
    );
    let source = Arc::new(JokeApiClient::new(settings.joke_api_url.clone()));
    let telegram = Arc::new(TelegramClient::new(&settings.bot_token));
    let selector = Selector::new(source, store);

    let broadcaster = Broadcaster::new(selector.clone(), telegram.clone(), &settings.site_url);

    if args.broadcast_now {
        let report = broadcaster.broadcast_all().await?;
        info!(
            users = report.total(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "One-off broadcast complete"
        );
        return Ok(());
    }

    if settings.broadcast_enabled && !args.no_scheduler {
        let schedule = DailySchedule::new(&settings.broadcast_cron, settings.broadcast_offset)?;
        info!(
            cron = %settings.broadcast_cron,
            offset = %settings.broadcast_offset,
            "Daily broadcast enabled"
        );
        tokio::spawn(async move {
            if let Err(e) = BroadcastScheduler::new(broadcaster, schedule).run().await {
                error!("Broadcast scheduler stopped: {}", e);
            }
        });
    }

    let handlers = Arc::new(Handlers::new(selector, telegram.clone(), &settings.site_url));

    let transport = async {
        match &settings.webhook_url {
            Some(base) => {
                let endpoint = telegram::webhook_endpoint(base, &settings.webhook_path);
                telegram.set_webhook(&endpoint).await?;
                info!("Webhook set: {}", endpoint);
                telegram::start_webhook_server(handlers, settings.bind_addr, &settings.webhook_path)
                    .await
            }
            None => {
                info!("No webhook URL configured, using polling mode");
                telegram.delete_webhook().await?;
                telegram::run_polling(telegram.clone(), handlers, settings.poll_timeout).await
            }
        }
    };

    tokio::select! {
        result = transport => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
