//! Telegram front end: single-message commands for registering and listing
//! alerts. No multi-step dialogs; everything an alert needs fits in one
//! message.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use tracing::{info, instrument, warn};

use crate::db;
use crate::model::AlertStatus;
use crate::schedule::RunPolicy;

const HELP_TEXT: &str = "Welcome to Marketwatch! Subscribe to marketplace searches and get a \
message whenever a new listing appears.\n\n\
/watch <query> [| min price [| max price]] - watch a search query\n\
/watchurl <url> - watch a prebuilt search URL\n\
/alerts - list your alerts\n\
/ping - health check";

#[instrument(skip_all)]
pub async fn handle_update(
    bot: &Bot,
    pool: &SqlitePool,
    policy: &RunPolicy,
    msg: &Message,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let trimmed = text.trim();
    let tg_chat_id = msg.chat.id.0;

    if trimmed == "/start" {
        let _ = bot.send_message(msg.chat.id, HELP_TEXT).await;
        return Ok(());
    }

    if trimmed == "/ping" {
        let _ = bot.send_message(msg.chat.id, "PONG").await;
        return Ok(());
    }

    if let Some(args) = command_args(trimmed, "/watch") {
        match parse_watch_args(args) {
            Some((query, from_price, to_price)) => {
                let chat_id = db::get_or_create_chat(pool, tg_chat_id).await?;
                let now = Utc::now();
                let alert = db::NewAlert {
                    created_by: chat_id,
                    query: Some(query.clone()),
                    url: None,
                    from_price,
                    to_price,
                    next_time_to_run: policy.initial_run_after(now),
                    expire_at: policy.expiry_after(now),
                };
                match db::create_alert(pool, &alert).await {
                    Ok(alert_id) => {
                        info!(alert_id, "registered query alert");
                        let _ = bot
                            .send_message(
                                msg.chat.id,
                                format!(
                                    "Watching \"{query}\". First results arrive in a few minutes."
                                ),
                            )
                            .await;
                    }
                    Err(err) => {
                        warn!(?err, "failed to create alert");
                        let _ = bot
                            .send_message(msg.chat.id, "Could not create that alert.")
                            .await;
                    }
                }
            }
            None => {
                let _ = bot
                    .send_message(
                        msg.chat.id,
                        "Usage: /watch <query> [| min price [| max price]]",
                    )
                    .await;
            }
        }
        return Ok(());
    }

    if let Some(url) = command_args(trimmed, "/watchurl") {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            let _ = bot
                .send_message(msg.chat.id, "Usage: /watchurl <http(s) search URL>")
                .await;
            return Ok(());
        }
        let chat_id = db::get_or_create_chat(pool, tg_chat_id).await?;
        let now = Utc::now();
        let alert = db::NewAlert {
            created_by: chat_id,
            query: None,
            url: Some(url.to_string()),
            from_price: None,
            to_price: None,
            next_time_to_run: policy.initial_run_after(now),
            expire_at: policy.expiry_after(now),
        };
        match db::create_alert(pool, &alert).await {
            Ok(alert_id) => {
                info!(alert_id, "registered url alert");
                let _ = bot
                    .send_message(
                        msg.chat.id,
                        "Watching that URL. First results arrive in a few minutes.",
                    )
                    .await;
            }
            Err(err) => {
                warn!(?err, "failed to create url alert");
                let _ = bot
                    .send_message(msg.chat.id, "Could not create that alert.")
                    .await;
            }
        }
        return Ok(());
    }

    if trimmed == "/alerts" {
        let chat_id = db::get_or_create_chat(pool, tg_chat_id).await?;
        let alerts = db::list_alerts_for_chat(pool, chat_id).await?;
        let reply = if alerts.is_empty() {
            "No alerts yet. Use /watch to create one.".to_string()
        } else {
            alerts
                .iter()
                .map(|a| {
                    let target = a
                        .query
                        .as_deref()
                        .or(a.url.as_deref())
                        .unwrap_or("-");
                    let state = match a.status {
                        AlertStatus::ReadyToSearch => "waiting",
                        AlertStatus::Ongoing => "scraping",
                    };
                    format!(
                        "#{} {} [{}] expires {}",
                        a.id,
                        target,
                        state,
                        a.expire_at.date_naive()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let _ = bot.send_message(msg.chat.id, reply).await;
        return Ok(());
    }

    if trimmed.starts_with('/') {
        let _ = bot.send_message(msg.chat.id, "Unknown command.").await;
    }

    Ok(())
}

/// Match a command token exactly and return its (possibly empty) argument
/// string. `/watch` and `/watch x` both match `/watch`; `/watchurl x` does
/// not, so command routing stays unambiguous.
fn command_args<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(command)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ').map(str::trim)
    }
}

/// Parse `/watch` arguments: `query [| min [| max]]`. Returns None when the
/// query is empty or a price bound fails to parse.
fn parse_watch_args(args: &str) -> Option<(String, Option<f64>, Option<f64>)> {
    let mut parts = args.split('|').map(str::trim);

    let query = parts.next().filter(|q| !q.is_empty())?.to_string();
    let from_price = match parts.next() {
        Some("") | None => None,
        Some(raw) => Some(raw.parse::<f64>().ok()?),
    };
    let to_price = match parts.next() {
        Some("") | None => None,
        Some(raw) => Some(raw.parse::<f64>().ok()?),
    };
    if parts.next().is_some() {
        return None;
    }
    Some((query, from_price, to_price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_command_matches_with_empty_args() {
        assert_eq!(command_args("/watch", "/watch"), Some(""));
        assert_eq!(command_args("/watchurl", "/watchurl"), Some(""));
        assert_eq!(command_args("/watch iphone", "/watch"), Some("iphone"));
        // A longer command never routes to a shorter prefix.
        assert_eq!(command_args("/watchurl http://x", "/watch"), None);
        assert_eq!(command_args("/alerts", "/watch"), None);
    }

    #[test]
    fn watch_args_query_only() {
        assert_eq!(
            parse_watch_args("iphone 13"),
            Some(("iphone 13".to_string(), None, None))
        );
    }

    #[test]
    fn watch_args_with_bounds() {
        assert_eq!(
            parse_watch_args("iphone 13 | 100 | 500"),
            Some(("iphone 13".to_string(), Some(100.0), Some(500.0)))
        );
        assert_eq!(
            parse_watch_args("nikon camera | | 500"),
            Some(("nikon camera".to_string(), None, Some(500.0)))
        );
    }

    #[test]
    fn watch_args_rejects_garbage() {
        assert_eq!(parse_watch_args(""), None);
        assert_eq!(parse_watch_args("   "), None);
        assert_eq!(parse_watch_args("x | cheap"), None);
        assert_eq!(parse_watch_args("x | 1 | 2 | 3"), None);
    }
}
