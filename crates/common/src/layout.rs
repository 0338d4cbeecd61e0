// Daily digest file layout: `daily/EVO_DIGEST_<YYYY-MM-DD>.md`.

use chrono::NaiveDate;
use thiserror::Error;

/// Directory (relative to the repository root) that holds daily digests.
pub const DIGEST_DIR: &str = "daily";

/// Shell glob covering every digest file and nothing else.
pub const DIGEST_PATHSPEC: &str = "daily/*.md";

/// `DIGEST_PATHSPEC` for git. Plain git pathspecs let `*` cross `/`, which
/// would pull in `daily/<subdir>/*.md`; glob magic keeps the match one level.
pub const DIGEST_GIT_PATHSPEC: &str = ":(glob)daily/*.md";

const FILE_PREFIX: &str = "EVO_DIGEST_";
const FILE_SUFFIX: &str = ".md";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("digest date must look like YYYY-MM-DD, got `{0}`")]
    MalformedDate(String),

    #[error("digest date `{0}` is not a calendar date")]
    InvalidDate(String),
}

/// Parse a strict `YYYY-MM-DD` run date.
pub fn parse_digest_date(input: &str) -> Result<NaiveDate, LayoutError> {
    let trimmed = input.trim();
    let bytes = trimmed.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(LayoutError::MalformedDate(trimmed.to_string()));
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| LayoutError::InvalidDate(trimmed.to_string()))
}

/// `YYYY-MM-DD` rendering used in file names and commit messages.
pub fn format_digest_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// File name for the digest of `date`, e.g. `EVO_DIGEST_2024-06-01.md`.
pub fn digest_file_name(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_SUFFIX}", format_digest_date(date))
}

/// Repository-relative path (always `/`-separated) of the digest of `date`.
pub fn digest_relative_path(date: NaiveDate) -> String {
    format!("{DIGEST_DIR}/{}", digest_file_name(date))
}

/// Commit message for publishing the digest of `date`.
pub fn commit_message(date: NaiveDate) -> String {
    format!("Add daily digest {}", format_digest_date(date))
}

/// Recover the date from a digest file name. Returns `None` for anything
/// that is not a digest file.
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let raw = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    parse_digest_date(raw).ok()
}
