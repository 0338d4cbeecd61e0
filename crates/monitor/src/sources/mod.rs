// Scraped sources. Each scanner is a pure function from page HTML plus dedup
// state to new alerts; fetching and scheduling live in `pipeline`.

pub mod evo_news;
pub mod exercise;
pub mod tdnet;

use scraper::ElementRef;
use url::Url;

/// Visible text of an element: every text node trimmed, then concatenated.
pub(crate) fn stripped_text(element: &ElementRef<'_>) -> String {
    element.text().map(str::trim).filter(|s| !s.is_empty()).collect::<Vec<_>>().concat()
}

/// Resolve an `href` against the page it appeared on.
pub(crate) fn join_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn stripped_text_drops_inner_whitespace_between_nodes() {
        let html = Html::parse_fragment("<li>\n  <span>2024.06.01</span>\n  <a>EVO FUND 割当</a>\n</li>");
        let selector = Selector::parse("li").unwrap();
        let li = html.select(&selector).next().unwrap();
        assert_eq!(stripped_text(&li), "2024.06.01EVO FUND 割当");
    }

    #[test]
    fn join_href_resolves_relative_links() {
        let base = Url::parse("https://www.example.test/ejs/news/").unwrap();
        assert_eq!(
            join_href(&base, "detail/42.html").as_deref(),
            Some("https://www.example.test/ejs/news/detail/42.html")
        );
        assert_eq!(join_href(&base, "/pdf/a.pdf").as_deref(), Some("https://www.example.test/pdf/a.pdf"));
        assert_eq!(join_href(&base, "  "), None);
    }
}
