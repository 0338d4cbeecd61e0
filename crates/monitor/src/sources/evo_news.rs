// EVO Japan Securities news page.

use std::sync::OnceLock;

use evo_digest_common::keywords::matches_any;
use evo_digest_common::types::{Alert, Source};
use scraper::{Html, Selector};
use url::Url;

use super::{join_href, stripped_text};
use crate::state::MonitorState;

fn item_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        Selector::parse("div.news-list li").expect("news item selector should parse")
    })
}

fn link_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a").expect("anchor selector should parse"))
}

/// A news list entry before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
}

/// Extract `div.news-list li` entries. Items without an anchor link back to
/// the news page itself.
pub fn parse_items(html: &str, page_url: &Url) -> Vec<NewsItem> {
    let document = Html::parse_document(html);
    document
        .select(item_selector())
        .map(|li| {
            let title = stripped_text(&li);
            let link = li
                .select(link_selector())
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| join_href(page_url, href))
                .unwrap_or_else(|| page_url.to_string());
            NewsItem { title, link }
        })
        .filter(|item| !item.title.is_empty())
        .collect()
}

/// Alerts for keyword-matching items whose link has not been posted before.
/// Newly alerted links are recorded in `state`.
pub fn scan(
    html: &str,
    page_url: &Url,
    keywords: &[String],
    state: &mut MonitorState,
) -> Vec<Alert> {
    parse_items(html, page_url)
        .into_iter()
        .filter(|item| matches_any(&item.title, keywords))
        .filter(|item| state.record_news(&item.link))
        .map(|item| Alert::new(Source::EvoNews, item.title, Some(item.link)))
        .collect()
}
