// Core domain types shared across the evo-digest crates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Where an alert came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// EVO Japan Securities news page.
    EvoNews,
    /// TDnet timely-disclosure PDF listing.
    Tdnet,
    /// Monthly warrant exercise status filings.
    Exercise,
}

impl Source {
    /// Bracketed tag used in chat messages and digest bullets.
    pub fn tag(self) -> &'static str {
        match self {
            Source::EvoNews => "[EVO NEWS]",
            Source::Tdnet => "[TDNET]",
            Source::Exercise => "[EXERCISE]",
        }
    }
}

/// A single newly discovered item worth telling someone about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub source: Source,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Alert {
    pub fn new(source: Source, title: impl Into<String>, url: Option<String>) -> Self {
        Self { source, title: title.into(), url }
    }

    /// Message body as posted to the chat webhook: tagged title, then the
    /// link on its own line when there is one.
    pub fn chat_message(&self) -> String {
        match &self.url {
            Some(url) => format!("{} {}\n{url}", self.source.tag(), self.title),
            None => format!("{} {}", self.source.tag(), self.title),
        }
    }
}

/// The alerts collected by one monitoring run, keyed by run date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Digest {
    pub date: NaiveDate,
    pub alerts: Vec<Alert>,
}

impl Digest {
    pub fn new(date: NaiveDate, alerts: Vec<Alert>) -> Self {
        Self { date, alerts }
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Render the digest as markdown. A digest without alerts renders as an
    /// empty string so that downstream steps treat it as "nothing new".
    pub fn render_markdown(&self) -> String {
        if self.alerts.is_empty() {
            return String::new();
        }

        let mut out = format!("# EVO digest {}\n\n", self.date.format("%Y-%m-%d"));
        for alert in &self.alerts {
            out.push_str(&format!("- {} {}", alert.source.tag(), alert.title));
            if let Some(url) = &alert.url {
                out.push_str(&format!("\n  {url}"));
            }
            out.push('\n');
        }
        out
    }
}
