// Monthly warrant exercise status ("月間行使状況") filings.
//
// A filing whose title reports the remaining-exercise ratio (残行使率) raises
// one alert when the ratio first drops to or below 20 %, 10 % or 0 %. The
// lowest threshold reached is remembered per issuer so each level fires once.

use std::sync::OnceLock;

use evo_digest_common::types::{Alert, Source};
use regex::Regex;

use super::tdnet::ListingEntry;
use crate::state::MonitorState;

/// Remaining-ratio thresholds, highest first.
pub const THRESHOLDS: [u8; 3] = [20, 10, 0];

const TITLE_MARKERS: [&str; 2] = ["月間行使状況", "残行使"];

fn ratio_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"残[^0-9０-９%％]{0,12}?([0-9]+(?:\.[0-9]+)?)\s*[%％]")
            .expect("remaining ratio pattern should compile")
    })
}

/// Remaining-exercise percentage reported in a filing title, if any.
pub fn remaining_ratio(title: &str) -> Option<f64> {
    let caps = ratio_pattern().captures(title)?;
    caps.get(1)?.as_str().parse::<f64>().ok()
}

/// Lowest threshold `ratio` has reached, if it reached any.
pub fn reached_threshold(ratio: f64) -> Option<u8> {
    THRESHOLDS.iter().rev().copied().find(|t| ratio <= f64::from(*t))
}

fn is_exercise_filing(title: &str) -> bool {
    TITLE_MARKERS.iter().any(|m| title.contains(m))
}

fn issuer_key(entry: &ListingEntry) -> String {
    match &entry.issuer {
        Some(issuer) => issuer.clone(),
        None => entry.title.split_whitespace().next().unwrap_or(&entry.title).to_string(),
    }
}

/// Alerts for exercise filings that reach a lower threshold than the one
/// already recorded for their issuer.
pub fn scan(entries: &[ListingEntry], state: &mut MonitorState) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for entry in entries.iter().filter(|e| is_exercise_filing(&e.title)) {
        let Some(ratio) = remaining_ratio(&entry.title) else {
            continue;
        };
        let Some(threshold) = reached_threshold(ratio) else {
            continue;
        };

        let issuer = issuer_key(entry);
        if state.exercise_flag(&issuer).is_some_and(|seen| seen <= threshold) {
            continue;
        }

        state.set_exercise_flag(&issuer, threshold);
        alerts.push(Alert::new(
            Source::Exercise,
            format!("{issuer} 残行使率 {ratio}% (≤{threshold}%)"),
            Some(entry.pdf_url.clone()),
        ));
    }

    alerts
}
