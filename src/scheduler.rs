//! Periodic dispatch of due alerts.
//!
//! A single loop fires `tick` on a fixed interval. Each tick reads the due
//! set, resolves owners, and spawns one scrape task per alert. Dispatch is
//! fire-and-forget: the tick never waits on a running scrape, and mutual
//! exclusion per alert comes from the status claim inside the runner, not
//! from this loop.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::db;
use crate::runner::{self, ScrapeContext, ScrapeJob};

/// One scheduler pass: select due alerts and dispatch a scrape task each.
/// Returns the number of tasks dispatched. A store error aborts the tick
/// cleanly (it only reads); the next tick proceeds independently.
#[instrument(skip_all)]
pub async fn tick(
    ctx: &Arc<ScrapeContext>,
    limiter: &Arc<Semaphore>,
    now: DateTime<Utc>,
) -> Result<usize> {
    let stale_before = now - ctx.max_runner_duration;
    let due = db::due_alerts(&ctx.pool, now, stale_before).await?;

    let mut dispatched = 0;
    for alert in due {
        let Some(tg_chat_id) = db::owner_tg_chat_id(&ctx.pool, alert.id).await? else {
            // No transport identity; leave the alert eligible and retry next
            // tick.
            warn!(alert_id = alert.id, "alert owner has no chat; skipping");
            continue;
        };

        // Bounded concurrency: when all scrape slots are busy, leave the rest
        // of the due set for the next tick rather than blocking it.
        let Ok(permit) = limiter.clone().try_acquire_owned() else {
            info!(alert_id = alert.id, "scrape slots exhausted; deferring remaining alerts");
            break;
        };

        let job = ScrapeJob::from_alert(&alert, tg_chat_id);
        let task_ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = runner::run_scrape(&task_ctx, &job).await {
                error!(?err, alert_id = job.alert_id, "scrape task failed");
            }
        });
        dispatched += 1;
    }
    Ok(dispatched)
}

/// Scheduler loop: fires `tick` every `tick_interval` forever.
pub async fn run_loop(ctx: Arc<ScrapeContext>, tick_interval: Duration, max_concurrent: usize) {
    let limiter = Arc::new(Semaphore::new(max_concurrent));
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match tick(&ctx, &limiter, Utc::now()).await {
            Ok(dispatched) if dispatched > 0 => {
                info!(dispatched, "scheduler tick dispatched scrapes");
            }
            Ok(_) => {}
            Err(err) => error!(?err, "scheduler tick failed"),
        }
    }
}
