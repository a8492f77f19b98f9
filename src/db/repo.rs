use crate::model::{Alert, AlertStatus, RawItem};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_or_create_chat(pool: &Pool, tg_chat_id: i64) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM chats WHERE tg_chat_id = ?")
        .bind(tg_chat_id)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }

    let rec = sqlx::query("INSERT INTO chats (tg_chat_id) VALUES (?) RETURNING id")
        .bind(tg_chat_id)
        .fetch_one(pool)
        .await?;
    Ok(rec.get::<i64, _>("id"))
}

/// Resolve the Telegram chat id that owns an alert. Returns None when the
/// owning chat row is missing, in which case the scheduler skips the alert.
#[instrument(skip_all)]
pub async fn owner_tg_chat_id(pool: &Pool, alert_id: i64) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT c.tg_chat_id FROM chats c JOIN alerts a ON a.created_by = c.id WHERE a.id = ?",
    )
    .bind(alert_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Parameters for registering a new alert. Exactly one of `query` / `url`
/// must be set.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub created_by: i64,
    pub query: Option<String>,
    pub url: Option<String>,
    pub from_price: Option<f64>,
    pub to_price: Option<f64>,
    pub next_time_to_run: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

#[instrument(skip_all)]
pub async fn create_alert(pool: &Pool, alert: &NewAlert) -> Result<i64> {
    if alert.query.is_some() == alert.url.is_some() {
        return Err(anyhow!("alert must have exactly one of query or url"));
    }
    let rec = sqlx::query(
        "INSERT INTO alerts (created_by, query, url, from_price, to_price, status, is_first_scrape, next_time_to_run, expire_at) \
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?) RETURNING id",
    )
    .bind(alert.created_by)
    .bind(alert.query.as_deref())
    .bind(alert.url.as_deref())
    .bind(alert.from_price)
    .bind(alert.to_price)
    .bind(AlertStatus::ReadyToSearch.as_str())
    .bind(alert.next_time_to_run)
    .bind(alert.expire_at)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert> {
    let status_str: String = row.get("status");
    let status = AlertStatus::parse_status(&status_str)
        .ok_or_else(|| anyhow!("alert has unknown status {status_str}"))?;
    Ok(Alert {
        id: row.get("id"),
        created_by: row.get("created_by"),
        query: row.get("query"),
        url: row.get("url"),
        from_price: row.get("from_price"),
        to_price: row.get("to_price"),
        status,
        is_first_scrape: row.get::<i64, _>("is_first_scrape") != 0,
        next_time_to_run: row.get("next_time_to_run"),
        expire_at: row.get("expire_at"),
        ongoing_since: row.get("ongoing_since"),
    })
}

/// Alerts due for a scrape at `now`: parked alerts whose run time has passed
/// and which have not expired, plus `ongoing` alerts whose claim is older
/// than `stale_before` (a crashed runner never released them).
#[instrument(skip_all)]
pub async fn due_alerts(
    pool: &Pool,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> Result<Vec<Alert>> {
    let rows = sqlx::query(
        "SELECT id, created_by, query, url, from_price, to_price, status, is_first_scrape, \
                next_time_to_run, expire_at, ongoing_since \
         FROM alerts \
         WHERE datetime(expire_at) > datetime(?) \
           AND ( (status = 'ready_to_search' AND datetime(next_time_to_run) < datetime(?)) \
              OR (status = 'ongoing' AND ongoing_since IS NOT NULL \
                  AND datetime(ongoing_since) <= datetime(?)) ) \
         ORDER BY datetime(next_time_to_run) ASC",
    )
    .bind(now)
    .bind(now)
    .bind(stale_before)
    .fetch_all(pool)
    .await?;

    rows.iter().map(alert_from_row).collect()
}

/// Claim an alert for a scrape run: compare-and-swap on `status`. Returns
/// false when another runner already holds it (skip silently, not an error).
/// A stale `ongoing` claim older than `stale_before` may be taken over.
#[instrument(skip_all)]
pub async fn claim_alert(
    pool: &Pool,
    alert_id: i64,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE alerts SET status = 'ongoing', ongoing_since = ? \
         WHERE id = ? \
           AND (status = 'ready_to_search' \
             OR (status = 'ongoing' AND ongoing_since IS NOT NULL \
                 AND datetime(ongoing_since) <= datetime(?)))",
    )
    .bind(now)
    .bind(alert_id)
    .bind(stale_before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Successful completion: park the alert with its jittered next run time and
/// clear the first-scrape flag.
#[instrument(skip_all)]
pub async fn finish_alert(pool: &Pool, alert_id: i64, next_run: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE alerts SET status = 'ready_to_search', next_time_to_run = ?, \
                is_first_scrape = 0, ongoing_since = NULL \
         WHERE id = ?",
    )
    .bind(next_run)
    .bind(alert_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Failure-path release: park the alert without touching its run time, so it
/// is retried at the next eligible tick.
#[instrument(skip_all)]
pub async fn release_alert(pool: &Pool, alert_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE alerts SET status = 'ready_to_search', ongoing_since = NULL WHERE id = ?",
    )
    .bind(alert_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_alert(pool: &Pool, alert_id: i64) -> Result<Alert> {
    let row = sqlx::query(
        "SELECT id, created_by, query, url, from_price, to_price, status, is_first_scrape, \
                next_time_to_run, expire_at, ongoing_since \
         FROM alerts WHERE id = ?",
    )
    .bind(alert_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Err(anyhow!("alert {alert_id} not found"));
    };
    alert_from_row(&row)
}

#[instrument(skip_all)]
pub async fn list_alerts_for_chat(pool: &Pool, chat_id: i64) -> Result<Vec<Alert>> {
    let rows = sqlx::query(
        "SELECT id, created_by, query, url, from_price, to_price, status, is_first_scrape, \
                next_time_to_run, expire_at, ongoing_since \
         FROM alerts WHERE created_by = ? ORDER BY id ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(alert_from_row).collect()
}

/// Record a listing for an alert if this (listing_id, alert_id) pair has not
/// been seen before. Returns true when the row was inserted, i.e. the item is
/// novel for this alert. The UNIQUE constraint makes reruns idempotent.
#[instrument(skip_all)]
pub async fn insert_listing_if_new(
    pool: &Pool,
    item: &RawItem,
    alert_id: i64,
    date_found: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO listings (listing_id, alert_id, name, price, seller, image_url, detail_url, date_found) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.listing_id)
    .bind(alert_id)
    .bind(&item.name)
    .bind(item.price)
    .bind(&item.seller)
    .bind(item.image_url.as_deref())
    .bind(&item.detail_url)
    .bind(date_found)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[instrument(skip_all)]
pub async fn count_listings_for_alert(pool: &Pool, alert_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE alert_id = ?")
        .bind(alert_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
