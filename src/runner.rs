//! The scrape task: one invocation per due alert.
//!
//! Flow: claim → resolve target URL → render → parse → dedup → notify →
//! reschedule. The alert is parked back to `ready_to_search` on every exit
//! path; a failed scrape keeps its old run time and retries at the next
//! eligible tick.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{self, Pool};
use crate::dedup;
use crate::fetch::{FetchError, PageFetcher};
use crate::model::Alert;
use crate::notify::{search_footer, Notifier};
use crate::parse::{self, ParseError};
use crate::schedule::RunPolicy;
use crate::search_url::build_search_url;

/// Error taxonomy for a single scrape. Fetch and parse failures are logged
/// differently: the former is transient, the latter means the source layout
/// changed and the selectors need updating.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
    #[error("notify error: {0}")]
    Notify(#[source] anyhow::Error),
}

/// Shared collaborators for scrape tasks.
pub struct ScrapeContext {
    pub pool: Pool,
    pub fetcher: Arc<dyn PageFetcher>,
    pub notifier: Arc<dyn Notifier>,
    pub policy: RunPolicy,
    pub base_url: String,
    pub max_runner_duration: Duration,
}

/// Everything one scrape invocation needs, captured at dispatch time.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub alert_id: i64,
    pub tg_chat_id: i64,
    pub query: Option<String>,
    pub url: Option<String>,
    pub from_price: Option<f64>,
    pub to_price: Option<f64>,
    pub is_first_scrape: bool,
}

impl ScrapeJob {
    pub fn from_alert(alert: &Alert, tg_chat_id: i64) -> Self {
        Self {
            alert_id: alert.id,
            tg_chat_id,
            query: alert.query.clone(),
            url: alert.url.clone(),
            from_price: alert.from_price,
            to_price: alert.to_price,
            is_first_scrape: alert.is_first_scrape,
        }
    }
}

/// Run one scrape for one alert. Never propagates scrape failures: they are
/// logged and the alert is released for a future tick. Only a failed claim
/// write surfaces as an error to the dispatching task.
#[instrument(skip_all, fields(alert_id = job.alert_id))]
pub async fn run_scrape(ctx: &ScrapeContext, job: &ScrapeJob) -> Result<()> {
    let started = Utc::now();
    let stale_before = started - ctx.max_runner_duration;
    if !db::claim_alert(&ctx.pool, job.alert_id, started, stale_before).await? {
        debug!("alert already claimed by another runner; skipping");
        return Ok(());
    }

    match scrape_once(ctx, job).await {
        Ok(new_count) => {
            let next_run = ctx.policy.next_run_after(Utc::now());
            debug_assert!(next_run > started);
            info!(new_count, %next_run, "scrape completed");
            if let Err(err) = db::finish_alert(&ctx.pool, job.alert_id, next_run).await {
                // The alert stays `ongoing` until the staleness reclaim picks
                // it up again.
                error!(?err, "failed to park alert after scrape");
            }
        }
        Err(err) => {
            match &err {
                ScrapeError::Fetch(_) => warn!(?err, "fetch failed; retrying next tick"),
                ScrapeError::Parse(_) => {
                    warn!(?err, "page shape unexpected; source layout may have changed")
                }
                ScrapeError::Store(_) | ScrapeError::Notify(_) => {
                    warn!(?err, "scrape aborted")
                }
            }
            if let Err(release_err) = db::release_alert(&ctx.pool, job.alert_id).await {
                error!(?release_err, "failed to release alert after error");
            }
        }
    }
    Ok(())
}

async fn scrape_once(ctx: &ScrapeContext, job: &ScrapeJob) -> Result<usize, ScrapeError> {
    let url = match &job.url {
        Some(url) => url.clone(),
        None => build_search_url(
            &ctx.base_url,
            job.query.as_deref().unwrap_or_default(),
            job.from_price,
            job.to_price,
        ),
    };
    let hostname = hostname_of(&url);

    // First scrape paginates exhaustively to capture existing inventory;
    // incremental runs only need the newest page.
    let html = ctx.fetcher.render(&url, job.is_first_scrape).await?;
    let items = parse::extract_items(&html, &hostname)?;
    debug!(items = items.len(), %url, "parsed result page");

    let outcome = dedup::dedup_and_persist(&ctx.pool, &items, job.alert_id, &hostname)
        .await
        .map_err(ScrapeError::Store)?;

    let footer = search_footer(
        job.query.as_deref(),
        job.from_price,
        job.to_price,
        job.url.as_deref(),
    );

    if job.is_first_scrape {
        let summary = format!(
            "Alert ran for the first time and found {} new listings! \
             Subsequent alerts will only send you new listings.\n{footer}",
            outcome.new_count,
        );
        ctx.notifier
            .send(job.tg_chat_id, &summary)
            .await
            .map_err(ScrapeError::Notify)?;
    } else if outcome.new_count > 0 {
        for message in &outcome.messages {
            ctx.notifier
                .send(job.tg_chat_id, &format!("{message}\n{footer}"))
                .await
                .map_err(ScrapeError::Notify)?;
        }
    }

    Ok(outcome.new_count)
}

fn hostname_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
