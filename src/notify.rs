//! Outbound notification transport.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

/// Capability interface for delivering alert messages. The runner awaits each
/// send before moving on, so messages for one alert arrive in batch order.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, tg_chat_id: i64, text: &str) -> Result<()>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, tg_chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(tg_chat_id), text)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await?;
        Ok(())
    }
}

/// Footer appended to every alert message, restating what the alert watches.
pub fn search_footer(
    query: Option<&str>,
    from_price: Option<f64>,
    to_price: Option<f64>,
    url: Option<&str>,
) -> String {
    let mut footer = String::from("----- ----- -----\n");
    if let Some(url) = url {
        footer.push_str(&format!("Watched URL: {url}\n"));
    } else {
        footer.push_str(&format!("Query: {}\n", query.unwrap_or("-")));
        footer.push_str(&format!("Minimum Price: {}\n", price_label(from_price)));
        footer.push_str(&format!("Maximum Price: {}\n", price_label(to_price)));
    }
    footer.push_str("----- ----- -----\n");
    footer
}

fn price_label(price: Option<f64>) -> String {
    match price {
        Some(p) if p != 0.0 => format!("${p}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_for_query_alert() {
        let footer = search_footer(Some("iphone 13"), Some(100.0), None, None);
        assert!(footer.contains("Query: iphone 13"));
        assert!(footer.contains("Minimum Price: $100"));
        assert!(footer.contains("Maximum Price: -"));
    }

    #[test]
    fn footer_for_url_alert() {
        let footer = search_footer(None, None, None, Some("https://www.carousell.sg/search/x"));
        assert!(footer.contains("Watched URL: https://www.carousell.sg/search/x"));
        assert!(!footer.contains("Query:"));
    }

    #[test]
    fn zero_bound_reads_as_unbounded() {
        let footer = search_footer(Some("x"), Some(0.0), Some(0.0), None);
        assert!(footer.contains("Minimum Price: -"));
        assert!(footer.contains("Maximum Price: -"));
    }
}
