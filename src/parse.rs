//! Listing-card extraction from a rendered result page.
//!
//! Selectors mirror the marketplace's current markup (`data-testid`
//! attributes on listing cards). When the site ships a new layout these are
//! the only things that need updating, and a `ParseError::Shape` in the logs
//! is the signal for it.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::currency::symbol_for_hostname;
use crate::model::RawItem;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The page structure did not match the expected layout. Distinct from a
    /// transient fetch failure: this means the source markup changed.
    #[error("unexpected page shape: {0}")]
    Shape(String),
}

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[data-testid^="listing-card-"]"#).expect("valid selector"));
static SELLER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"p[data-testid="listing-card-text-seller-name"]"#).expect("valid selector")
});
static NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"p[style*="--max-line"]"#).expect("valid selector"));
static PRICE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p[title]").expect("valid selector"));
static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("valid selector"));

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static LETTERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]").expect("valid regex"));

/// Extract listing items from a rendered result page, in page order.
/// `hostname` selects the currency symbol used to recognize price nodes and
/// anchors the constructed detail URLs.
pub fn extract_items(html: &str, hostname: &str) -> Result<Vec<RawItem>, ParseError> {
    let document = Html::parse_document(html);
    let symbol = symbol_for_hostname(hostname);

    let mut items = Vec::new();
    for card in document.select(&CARD_SELECTOR) {
        items.push(extract_card(&card, hostname, symbol)?);
    }
    Ok(items)
}

fn extract_card(card: &ElementRef, hostname: &str, symbol: &str) -> Result<RawItem, ParseError> {
    let testid = card
        .value()
        .attr("data-testid")
        .unwrap_or_default()
        .to_string();
    let listing_id = testid
        .split('-')
        .nth(2)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ParseError::Shape(format!("listing card without id: {testid:?}")))?
        .to_string();

    let name = card
        .select(&NAME_SELECTOR)
        .next()
        .map(|n| n.text().collect::<String>())
        .ok_or_else(|| ParseError::Shape(format!("listing {listing_id} has no name node")))?;

    let seller = card
        .select(&SELLER_SELECTOR)
        .next()
        .map(|n| n.text().collect::<String>())
        .ok_or_else(|| ParseError::Shape(format!("listing {listing_id} has no seller node")))?;

    // Price nodes carry the localized amount in their title attribute; a card
    // without one is a free/placeholder listing, priced as zero.
    let price = card
        .select(&PRICE_SELECTOR)
        .find(|n| n.value().attr("title").is_some_and(|t| t.contains(symbol)))
        .map(|n| n.text().collect::<String>())
        .map(|raw| clean_price(&raw))
        .unwrap_or(0.0);

    let image_url = card
        .select(&IMG_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let detail_url = format!("https://{hostname}/p/{}-{listing_id}", slugify(&name));

    Ok(RawItem {
        listing_id,
        name,
        price,
        seller,
        image_url,
        detail_url,
    })
}

/// Strip currency symbols, thousands separators and stray letters, then parse.
fn clean_price(raw: &str) -> f64 {
    let cleaned = raw.replace('$', "").replace(',', "");
    let cleaned = LETTERS_RE.replace_all(&cleaned, "");
    cleaned.trim().parse().unwrap_or(0.0)
}

/// Listing names become URL slugs: drop punctuation, join words with dashes.
fn slugify(name: &str) -> String {
    let slug = NON_WORD_RE.replace_all(name, "");
    let slug = WHITESPACE_RE.replace_all(slug.trim(), "-");
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_html(id: &str, name: &str, price: &str, seller: &str) -> String {
        format!(
            r#"<div data-testid="listing-card-{id}">
                 <img src="https://img.example/{id}.jpg"/>
                 <p data-testid="listing-card-text-seller-name">{seller}</p>
                 <p style="--max-line: 2">{name}</p>
                 <p title="{price}">{price}</p>
               </div>"#
        )
    }

    #[test]
    fn extracts_items_in_page_order() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            card_html("111", "iPhone 13 Pro", "S$850", "alice"),
            card_html("222", "Nikon D750 (body only)", "S$1,200", "bob"),
        );
        let items = extract_items(&html, "www.carousell.sg").unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].listing_id, "111");
        assert_eq!(items[0].name, "iPhone 13 Pro");
        assert_eq!(items[0].price, 850.0);
        assert_eq!(items[0].seller, "alice");
        assert_eq!(
            items[0].detail_url,
            "https://www.carousell.sg/p/iPhone-13-Pro-111"
        );
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://img.example/111.jpg")
        );

        assert_eq!(items[1].listing_id, "222");
        assert_eq!(items[1].price, 1200.0);
        assert_eq!(
            items[1].detail_url,
            "https://www.carousell.sg/p/Nikon-D750-body-only-222"
        );
    }

    #[test]
    fn missing_seller_is_a_shape_error() {
        let html = r#"<div data-testid="listing-card-9">
                        <p style="--max-line: 2">thing</p>
                      </div>"#;
        let err = extract_items(html, "www.carousell.sg").unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn card_without_price_node_is_zero_priced() {
        let html = r#"<div data-testid="listing-card-5">
                        <p data-testid="listing-card-text-seller-name">carol</p>
                        <p style="--max-line: 2">freebie</p>
                      </div>"#;
        let items = extract_items(html, "www.carousell.sg").unwrap();
        assert_eq!(items[0].price, 0.0);
    }

    #[test]
    fn empty_page_yields_no_items() {
        let items = extract_items("<html><body></body></html>", "www.carousell.sg").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn slugify_trims_punctuation() {
        assert_eq!(slugify("!Hot deal!"), "Hot-deal");
        assert_eq!(slugify("  plain  "), "plain");
    }
}
