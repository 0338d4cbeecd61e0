// Step outputs for GitHub Actions (`$GITHUB_OUTPUT`).
//
// Multiline values use the heredoc form:
//
//   summary<<ghadelim_<uuid>
//   ...
//   ghadelim_<uuid>
//
// The runner drops the newline right before the closing delimiter, so one is
// always added after the value and a trailing newline in the value survives.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use uuid::Uuid;

use crate::persist::is_blank_summary;

/// Environment variable naming the step output file.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Name of the digest step output.
pub const SUMMARY_OUTPUT: &str = "summary";

/// Render one output entry with a delimiter that does not occur in `value`.
pub fn format_output(name: &str, value: &str) -> String {
    let delimiter = loop {
        let candidate = format!("ghadelim_{}", Uuid::new_v4().simple());
        if !value.contains(&candidate) {
            break candidate;
        }
    };
    format_with_delimiter(name, value, &delimiter)
}

fn format_with_delimiter(name: &str, value: &str, delimiter: &str) -> String {
    let mut out = format!("{name}<<{delimiter}\n{value}");
    if !value.is_empty() {
        out.push('\n');
    }
    out.push_str(delimiter);
    out.push('\n');
    out
}

/// Append an output entry to the file at `path`.
pub fn append_output(path: &Path, name: &str, value: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_output(name, value).as_bytes())?;
    file.flush()
}

/// Export `summary` to `$GITHUB_OUTPUT` when running inside Actions.
/// Returns `false` when the variable is unset, so the caller can print the
/// summary instead.
pub fn export_summary(summary: &str) -> io::Result<bool> {
    match std::env::var_os(GITHUB_OUTPUT_ENV) {
        Some(path) if !path.is_empty() => {
            append_summary(Path::new(&path), summary)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Append the summary output. A blank summary is exported as empty so the
/// workflow's `!= ''` gate skips exactly what the digest writer would skip.
pub fn append_summary(path: &Path, summary: &str) -> io::Result<()> {
    let value = if is_blank_summary(summary) { "" } else { summary };
    append_output(path, SUMMARY_OUTPUT, value)
}
