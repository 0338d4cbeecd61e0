// TDnet daily disclosure listing.
//
// Listing pages live at `<base>/old/<YYYYMM>/<DD>/index.html` and link every
// filing PDF of the day. Filings are matched on URL only; PDFs are never
// downloaded.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike};
use evo_digest_common::keywords::matches_any_ignore_case;
use evo_digest_common::types::{Alert, Source};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{join_href, stripped_text};
use crate::state::MonitorState;

/// Alert title for a matching filing.
pub const FILING_ALERT_TITLE: &str = "EVO関連";

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("anchor selector should parse"))
}

fn issuer_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("td.kjName").expect("issuer selector should parse"))
}

/// One PDF link on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Anchor text (the filing title).
    pub title: String,
    /// Company name from the same table row, when the page has one.
    pub issuer: Option<String>,
    pub pdf_url: String,
}

/// Listing page URL for a JST calendar date.
pub fn listing_url(base_url: &str, date: NaiveDate) -> String {
    format!(
        "{}/old/{:04}{:02}/{:02}/index.html",
        base_url.trim_end_matches('/'),
        date.year(),
        date.month(),
        date.day()
    )
}

/// Whether `now` (JST) falls inside `[open_hour, close_hour)`.
pub fn in_market_hours(now: DateTime<FixedOffset>, open_hour: u32, close_hour: u32) -> bool {
    (open_hour..close_hour).contains(&now.hour())
}

/// Every `.pdf` link on the page, resolved against the listing URL, in page
/// order.
pub fn parse_listing(html: &str, listing_url: &Url) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    document
        .select(anchor_selector())
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !href.trim().to_ascii_lowercase().ends_with(".pdf") {
                return None;
            }
            let pdf_url = join_href(listing_url, href)?;
            Some(ListingEntry { title: stripped_text(&a), issuer: row_issuer(&a), pdf_url })
        })
        .collect()
}

fn row_issuer(anchor: &ElementRef<'_>) -> Option<String> {
    let row = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr")?;
    row.select(issuer_selector())
        .next()
        .map(|td| stripped_text(&td))
        .filter(|name| !name.is_empty())
}

/// Alerts for listing entries whose URL carries one of `markers` and has not
/// been posted before. Newly alerted URLs are recorded in `state`.
pub fn scan(entries: &[ListingEntry], markers: &[String], state: &mut MonitorState) -> Vec<Alert> {
    entries
        .iter()
        .filter(|entry| matches_any_ignore_case(&entry.pdf_url, markers))
        .filter(|entry| state.record_filing(&entry.pdf_url))
        .map(|entry| Alert::new(Source::Tdnet, FILING_ALERT_TITLE, Some(entry.pdf_url.clone())))
        .collect()
}
