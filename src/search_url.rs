//! Deterministic search URL construction for query-based alerts.

/// Build the marketplace search URL for a free-text query with optional price
/// bounds. The query is percent-encoded into the path; `price_start` /
/// `price_end` filter terms are appended only when the corresponding bound is
/// present (and, for the upper bound, nonzero).
pub fn build_search_url(
    base_url: &str,
    query: &str,
    from_price: Option<f64>,
    to_price: Option<f64>,
) -> String {
    let mut filters = Vec::new();
    if let Some(from) = from_price {
        filters.push(format!("price_start={from}"));
    }
    if let Some(to) = to_price {
        if to != 0.0 {
            filters.push(format!("price_end={to}"));
        }
    }

    let mut url = format!(
        "{}/search/{}/?addRecent=false&sort_by=3&tab=marketplace&includeSuggestions=false",
        base_url.trim_end_matches('/'),
        urlencoding::encode(query),
    );
    if !filters.is_empty() {
        url.push('&');
        url.push_str(&filters.join("&"));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.carousell.sg";

    #[test]
    fn encodes_query_and_lower_bound_only() {
        let url = build_search_url(BASE, "iphone 13", Some(100.0), None);
        assert!(url.contains("/search/iphone%2013/"));
        assert!(url.contains("price_start=100"));
        assert!(!url.contains("price_end"));
    }

    #[test]
    fn zero_upper_bound_means_unbounded() {
        let url = build_search_url(BASE, "x", None, Some(0.0));
        assert!(!url.contains("price_start"));
        assert!(!url.contains("price_end"));
    }

    #[test]
    fn both_bounds_present() {
        let url = build_search_url(BASE, "nikon camera", Some(50.0), Some(500.0));
        assert!(url.contains("price_start=50"));
        assert!(url.contains("price_end=500"));
        assert!(url.contains("sort_by=3"));
    }

    #[test]
    fn trailing_slash_on_base_is_tolerated() {
        let url = build_search_url("https://www.carousell.sg/", "x", None, None);
        assert!(url.starts_with("https://www.carousell.sg/search/x/?"));
    }
}
