// Cross-run dedup state, persisted as pretty JSON next to the repository.
//
// {
//   "evo_news": ["https://.../news/1", ...],
//   "tdnet": ["https://.../140120240601.pdf", ...],
//   "exercise_flags": { "ACME": 10 },
//   "pending_digest": [{ "source": "tdnet", "title": "EVO関連", "url": "..." }]
// }
//
// `pending_digest` only appears while the long-running monitor holds alerts
// that have not made it into a daily digest yet.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use evo_digest_common::types::Alert;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("state file `{path}` is not valid JSON: {source}")]
    Decode { path: PathBuf, source: serde_json::Error },

    #[error("failed to write state file `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

/// Links and thresholds that have already been alerted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorState {
    /// News item links already posted.
    pub evo_news: Vec<String>,
    /// TDnet PDF URLs already posted.
    pub tdnet: Vec<String>,
    /// Lowest remaining-exercise threshold (percent) already posted, per issuer.
    pub exercise_flags: BTreeMap<String, u8>,
    /// Alerts already posted but not yet written to a daily digest.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending_digest: Vec<Alert>,
}

impl MonitorState {
    /// Load state from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .map_err(|source| StateError::Read { path: path.to_path_buf(), source })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw)
            .map_err(|source| StateError::Decode { path: path.to_path_buf(), source })
    }

    /// Write state to `path` via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let write_err = |source| StateError::Write { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut encoded = serde_json::to_vec_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        encoded.push(b'\n');

        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(&encoded).map_err(write_err)?;
        file.sync_data().map_err(write_err)?;
        drop(file);
        fs::rename(&tmp_path, path).map_err(write_err)
    }

    pub fn has_news(&self, link: &str) -> bool {
        self.evo_news.iter().any(|seen| seen == link)
    }

    /// Record a news link; returns `false` when it was already known.
    pub fn record_news(&mut self, link: &str) -> bool {
        if self.has_news(link) {
            return false;
        }
        self.evo_news.push(link.to_string());
        true
    }

    pub fn has_filing(&self, url: &str) -> bool {
        self.tdnet.iter().any(|seen| seen == url)
    }

    /// Record a TDnet URL; returns `false` when it was already known.
    pub fn record_filing(&mut self, url: &str) -> bool {
        if self.has_filing(url) {
            return false;
        }
        self.tdnet.push(url.to_string());
        true
    }

    pub fn exercise_flag(&self, issuer: &str) -> Option<u8> {
        self.exercise_flags.get(issuer).copied()
    }

    pub fn set_exercise_flag(&mut self, issuer: &str, threshold: u8) {
        self.exercise_flags.insert(issuer.to_string(), threshold);
    }
}
