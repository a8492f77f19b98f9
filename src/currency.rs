//! Hostname → currency symbol lookup.
//!
//! The marketplace runs one site per country; the TLD of the result page's
//! hostname decides which currency symbol listings are priced in.

const CURRENCY_BY_TLD: &[(&str, &str)] = &[
    ("sg", "S$"),
    ("my", "RM"),
    ("ph", "PHP"),
    ("hk", "HK$"),
    ("tw", "NT$"),
    ("id", "Rp"),
    ("au", "A$"),
    ("nz", "NZ$"),
    ("ca", "C$"),
    ("com", "$"),
];

/// Currency symbol for a result-page hostname, keyed by its last label.
/// Unknown TLDs fall back to a bare dollar sign.
pub fn symbol_for_hostname(hostname: &str) -> &'static str {
    let tld = hostname.rsplit('.').next().unwrap_or_default();
    CURRENCY_BY_TLD
        .iter()
        .find(|(suffix, _)| *suffix == tld)
        .map(|(_, symbol)| *symbol)
        .unwrap_or("$")
}
