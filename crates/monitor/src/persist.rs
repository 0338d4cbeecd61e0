// Daily digest persistence: `daily/EVO_DIGEST_<YYYY-MM-DD>.md`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use evo_digest_common::layout::{date_from_file_name, digest_file_name, DIGEST_DIR};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create digest directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("failed to write digest `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("failed to list digest directory `{path}`: {source}")]
    List { path: PathBuf, source: std::io::Error },
}

/// What a persistence attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The summary was empty; nothing was written.
    Skipped,
    /// The digest file was written. `replaced` is true when a file for the
    /// same date already existed and was overwritten.
    Written { path: PathBuf, replaced: bool },
}

impl PersistOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PersistOutcome::Skipped => None,
            PersistOutcome::Written { path, .. } => Some(path),
        }
    }
}

/// Absolute path of the digest for `date` under `repo_root`.
pub fn digest_path(repo_root: &Path, date: NaiveDate) -> PathBuf {
    repo_root.join(DIGEST_DIR).join(digest_file_name(date))
}

/// Whether a summary counts as "nothing new": empty or whitespace only.
pub fn is_blank_summary(summary: &str) -> bool {
    summary.trim().is_empty()
}

/// Write `summary` as the entire content of the digest for `date`.
///
/// A blank summary (empty or whitespace only) writes nothing. An existing
/// file for the same date is replaced, never appended to.
pub fn persist_summary(
    repo_root: &Path,
    date: NaiveDate,
    summary: &str,
) -> Result<PersistOutcome, PersistError> {
    if is_blank_summary(summary) {
        debug!(%date, "empty summary, skipping digest write");
        return Ok(PersistOutcome::Skipped);
    }

    let dir = repo_root.join(DIGEST_DIR);
    fs::create_dir_all(&dir).map_err(|source| PersistError::CreateDir { path: dir.clone(), source })?;

    let path = digest_path(repo_root, date);
    let replaced = path.exists();
    fs::write(&path, summary).map_err(|source| PersistError::Write { path: path.clone(), source })?;

    info!(path = %path.display(), replaced, "digest written");
    Ok(PersistOutcome::Written { path, replaced })
}

/// Digest files under `repo_root`, oldest first. Other files in the digest
/// directory are ignored.
pub fn list_digests(repo_root: &Path) -> Result<Vec<(NaiveDate, PathBuf)>, PersistError> {
    let dir = repo_root.join(DIGEST_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let list_err = |source| PersistError::List { path: dir.clone(), source };
    let mut digests = Vec::new();
    for entry in fs::read_dir(&dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let name = entry.file_name();
        if let Some(date) = name.to_str().and_then(date_from_file_name) {
            digests.push((date, entry.path()));
        }
    }
    digests.sort_by_key(|(date, _)| *date);
    Ok(digests)
}
