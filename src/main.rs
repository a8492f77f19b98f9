use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, info};

use tg_marketwatch::fetch::BrowserlessFetcher;
use tg_marketwatch::notify::TelegramNotifier;
use tg_marketwatch::runner::ScrapeContext;
use tg_marketwatch::schedule::RunPolicy;
use tg_marketwatch::{config, db, handlers, scheduler};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/marketwatch.db".into());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let policy = RunPolicy::from_config(&cfg.app);

    // Spawn the scrape scheduler loop.
    let ctx = Arc::new(ScrapeContext {
        pool: pool.clone(),
        fetcher: Arc::new(BrowserlessFetcher::new(
            &cfg.marketplace.render_url,
            cfg.marketplace.render_token.as_deref(),
            Duration::from_secs(cfg.app.fetch_timeout_secs),
        )),
        notifier: Arc::new(TelegramNotifier::new(bot.clone())),
        policy,
        base_url: cfg.marketplace.base_url.clone(),
        max_runner_duration: chrono::Duration::seconds(cfg.app.max_runner_duration_secs),
    });
    tokio::spawn(scheduler::run_loop(
        ctx,
        Duration::from_secs(cfg.app.tick_interval_secs),
        cfg.app.max_concurrent_scrapes,
    ));

    info!("starting telegram bot");
    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let pool = pool.clone();
        let policy = policy;
        async move {
            if let Err(err) = handlers::handle_update(&bot, &pool, &policy, &msg).await {
                error!(?err, "failed to handle update");
            }
            respond(())
        }
    })
    .await;

    Ok(())
}
