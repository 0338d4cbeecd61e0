// Keyword matching for news titles and filing URLs.

/// Default title keywords for the news and disclosure scans.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "EVO FUND",
    "Evolution Capital",
    "第三者割当",
    "新株予約権",
    "行使価額",
    "月間行使状況",
];

/// Lowercase fragments that mark a TDnet PDF URL as EVO related.
pub const DEFAULT_URL_MARKERS: &[&str] = &["evo", "evolution"];

/// Case-sensitive substring match against any keyword.
///
/// Japanese keywords have no case, and the English ones are proper nouns that
/// appear with fixed casing on the source pages.
pub fn matches_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|k| {
        let k = k.as_ref();
        !k.is_empty() && text.contains(k)
    })
}

/// Case-insensitive substring match, used for URLs.
pub fn matches_any_ignore_case<S: AsRef<str>>(text: &str, markers: &[S]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|m| {
        let m = m.as_ref();
        !m.is_empty() && lower.contains(&m.to_lowercase())
    })
}

/// Owned copy of the default keyword list.
pub fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// Owned copy of the default URL marker list.
pub fn default_url_markers() -> Vec<String> {
    DEFAULT_URL_MARKERS.iter().map(|k| k.to_string()).collect()
}
