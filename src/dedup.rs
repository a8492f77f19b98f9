//! Listing deduplication and message batching.
//!
//! Fetched items are checked against the persisted history per alert; only
//! items never seen for that alert survive, get recorded, and are rendered
//! into transport-ready message batches.

use anyhow::Result;
use chrono::Utc;
use teloxide::utils::html;
use tracing::instrument;

use crate::currency::symbol_for_hostname;
use crate::db::{self, Pool};
use crate::model::RawItem;

/// Telegram messages cap out around 4096 chars; 8 rendered listings per
/// message keeps us comfortably under that.
pub const MAX_ITEMS_PER_MESSAGE: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Items that had no listing record for this alert and were persisted.
    pub new_count: usize,
    /// Rendered message batches, in page order.
    pub messages: Vec<String>,
}

/// Filter `items` down to those never seen for `alert_id`, persist the novel
/// ones, and render them into message batches. Items are processed in input
/// (page) order; reruns with the same input are no-ops.
#[instrument(skip_all)]
pub async fn dedup_and_persist(
    pool: &Pool,
    items: &[RawItem],
    alert_id: i64,
    hostname: &str,
) -> Result<DedupOutcome> {
    let date_found = Utc::now().date_naive().to_string();

    let mut novel = Vec::new();
    for item in items {
        if db::insert_listing_if_new(pool, item, alert_id, &date_found).await? {
            novel.push(item.clone());
        }
    }

    let messages = render_batches(&novel, symbol_for_hostname(hostname));
    Ok(DedupOutcome {
        new_count: novel.len(),
        messages,
    })
}

/// Render items into messages of at most [`MAX_ITEMS_PER_MESSAGE`] listings
/// each, preserving input order.
pub fn render_batches(items: &[RawItem], currency_symbol: &str) -> Vec<String> {
    items
        .chunks(MAX_ITEMS_PER_MESSAGE)
        .map(|chunk| {
            chunk
                .iter()
                .map(|item| render_item(item, currency_symbol))
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .collect()
}

fn render_item(item: &RawItem, currency_symbol: &str) -> String {
    format!(
        "<b>{}</b>\nPrice: <b>{}{}</b>\nSeller: {}\nVisit Here: {}\n",
        html::escape(&item.name),
        currency_symbol,
        item.price,
        html::escape(&item.seller),
        item.detail_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> RawItem {
        RawItem {
            listing_id: format!("id-{n}"),
            name: format!("Item {n}"),
            price: 10.0 + n as f64,
            seller: "seller".into(),
            image_url: None,
            detail_url: format!("https://www.carousell.sg/p/item-{n}"),
        }
    }

    #[test]
    fn batch_count_is_ceil_of_items_over_cap() {
        for (n, expected) in [(0, 0), (1, 1), (8, 1), (9, 2), (16, 2), (17, 3)] {
            let items: Vec<RawItem> = (0..n).map(item).collect();
            let batches = render_batches(&items, "S$");
            assert_eq!(batches.len(), expected, "n={n}");
        }
    }

    #[test]
    fn last_batch_holds_the_remainder() {
        let items: Vec<RawItem> = (0..11).map(item).collect();
        let batches = render_batches(&items, "S$");
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].matches("Visit Here").count(), 8);
        assert_eq!(batches[1].matches("Visit Here").count(), 3);
        // Page order preserved across the batch boundary.
        assert!(batches[0].contains("Item 0"));
        assert!(batches[1].contains("Item 8"));
    }

    #[test]
    fn listings_within_a_message_are_blank_line_separated() {
        let items: Vec<RawItem> = (0..2).map(item).collect();
        let batches = render_batches(&items, "S$");
        assert_eq!(batches.len(), 1);
        // Each rendered item ends with its own newline; joining with a blank
        // line leaves an empty line between listings.
        assert!(batches[0].contains("item-0\n\n\n<b>Item 1</b>"));
    }

    #[test]
    fn item_template_localizes_price_and_escapes_html() {
        let mut it = item(1);
        it.name = "Cheap & cheerful <mint>".into();
        let batches = render_batches(&[it], "PHP");
        assert!(batches[0].contains("Price: <b>PHP11</b>"));
        assert!(batches[0].contains("Cheap &amp; cheerful &lt;mint&gt;"));
    }
}
