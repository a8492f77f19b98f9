use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert lifecycle state. An alert is only ever parked waiting for its next
/// run, or claimed by a runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertStatus {
    ReadyToSearch,
    Ongoing,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::ReadyToSearch => "ready_to_search",
            AlertStatus::Ongoing => "ongoing",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "ready_to_search" => Some(AlertStatus::ReadyToSearch),
            "ongoing" => Some(AlertStatus::Ongoing),
            _ => None,
        }
    }
}

/// A standing search subscription owned by one chat.
///
/// Exactly one of `query` / `url` is set: free-text alerts carry the query
/// plus optional price bounds, URL alerts watch a prebuilt search URL
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub created_by: i64,
    pub query: Option<String>,
    pub url: Option<String>,
    pub from_price: Option<f64>,
    pub to_price: Option<f64>,
    pub status: AlertStatus,
    pub is_first_scrape: bool,
    pub next_time_to_run: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
    pub ongoing_since: Option<DateTime<Utc>>,
}

/// Persisted dedup record: one row per (marketplace listing, alert) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub listing_id: String,
    pub alert_id: i64,
    pub name: String,
    pub price: f64,
    pub seller: String,
    pub image_url: Option<String>,
    pub detail_url: String,
    pub date_found: String,
}

/// Ephemeral item as parsed off a result page. Consumed by the deduplicator,
/// never stored directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub listing_id: String,
    pub name: String,
    pub price: f64,
    pub seller: String,
    pub image_url: Option<String>,
    pub detail_url: String,
}
