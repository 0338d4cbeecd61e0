// `evo-digest save`: write a summary to `daily/EVO_DIGEST_<date>.md`.
//
// The summary comes from `--summary`, `--summary-file`, or stdin. A blank
// summary writes nothing and commits nothing.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Args;
use evo_monitor::git::publish::PublishOutcome;
use evo_monitor::pipeline::finish;
use serde::Serialize;

use super::{load_config, resolve_date};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Digest date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Summary text.
    #[arg(long, conflicts_with = "summary_file")]
    summary: Option<String>,

    /// Read the summary from a file.
    #[arg(long, value_name = "PATH")]
    summary_file: Option<PathBuf>,

    /// Commit and push the digest after writing it.
    #[arg(long)]
    commit: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveResult {
    pub date: NaiveDate,
    /// `None` when the summary was blank.
    pub path: Option<PathBuf>,
    pub replaced: bool,
    pub published: Option<PublishOutcome>,
}

pub fn run(args: SaveArgs, root: &Path) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match execute(args, root) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn execute(args: SaveArgs, root: &Path) -> anyhow::Result<SaveResult> {
    let config = load_config(root)?;
    let date = resolve_date(args.date.as_deref(), &config)?;
    let summary = read_summary(args.summary, args.summary_file.as_deref())?;

    let finished = finish(root, &config, date, &summary, args.commit)?;
    Ok(SaveResult {
        date,
        path: finished.persisted,
        replaced: finished.replaced,
        published: finished.published,
    })
}

fn read_summary(inline: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(summary) = inline {
        return Ok(summary);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read summary from `{}`", path.display()));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("no summary given: pass --summary, --summary-file, or pipe it on stdin");
    }
    let mut buf = String::new();
    stdin.lock().read_to_string(&mut buf).context("failed to read summary from stdin")?;
    Ok(buf)
}

fn format_human(result: &SaveResult) -> String {
    let Some(path) = &result.path else {
        return format!("Empty summary, nothing saved for {}.", result.date);
    };

    let verb = if result.replaced { "Replaced" } else { "Wrote" };
    let mut lines = vec![format!("{verb} {}", path.display())];
    match &result.published {
        Some(PublishOutcome::Committed { commit, message, .. }) => {
            lines.push(format!("Committed {commit} \"{message}\""));
        }
        Some(PublishOutcome::NothingToCommit) => lines.push("Nothing to commit.".to_string()),
        None => {}
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn save_args(summary: &str) -> SaveArgs {
        SaveArgs {
            date: Some("2024-06-01".to_string()),
            summary: Some(summary.to_string()),
            summary_file: None,
            commit: false,
            json: true,
        }
    }

    #[test]
    fn inline_summary_wins() {
        let summary = read_summary(Some("Evo update".to_string()), None).unwrap();
        assert_eq!(summary, "Evo update");
    }

    #[test]
    fn summary_file_is_read_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.md");
        std::fs::write(&path, "line one\nline two\n").unwrap();
        assert_eq!(read_summary(None, Some(&path)).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn missing_summary_file_names_the_path() {
        let error = read_summary(None, Some(Path::new("/nonexistent/summary.md")))
            .expect_err("missing file should fail");
        assert!(error.to_string().contains("/nonexistent/summary.md"));
    }

    #[test]
    fn save_writes_exact_summary() {
        let dir = TempDir::new().unwrap();
        let result = execute(save_args("Evo update: X released"), dir.path()).unwrap();

        let path = dir.path().join("daily/EVO_DIGEST_2024-06-01.md");
        assert_eq!(result.path.as_deref(), Some(path.as_path()));
        assert!(!result.replaced);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Evo update: X released");
    }

    #[test]
    fn second_save_replaces_first() {
        let dir = TempDir::new().unwrap();
        execute(save_args("first"), dir.path()).unwrap();
        let result = execute(save_args("second"), dir.path()).unwrap();

        assert!(result.replaced);
        let files: Vec<_> = std::fs::read_dir(dir.path().join("daily")).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("daily/EVO_DIGEST_2024-06-01.md")).unwrap(),
            "second"
        );
    }

    #[test]
    fn blank_summary_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut args = save_args("  \n");
        // No git repository exists; a commit attempt would fail.
        args.commit = true;
        let result = execute(args, dir.path()).unwrap();
        assert!(result.path.is_none());
        assert!(!dir.path().join("daily").exists());
    }

    #[test]
    fn human_format_reports_replacement() {
        let result = SaveResult {
            date: june_first(),
            path: Some(PathBuf::from("daily/EVO_DIGEST_2024-06-01.md")),
            replaced: true,
            published: Some(PublishOutcome::NothingToCommit),
        };
        let output = format_human(&result);
        assert!(output.starts_with("Replaced daily/EVO_DIGEST_2024-06-01.md"));
        assert!(output.contains("Nothing to commit."));
    }

    #[test]
    fn human_format_reports_empty_summary() {
        let result = SaveResult { date: june_first(), path: None, replaced: false, published: None };
        assert_eq!(format_human(&result), "Empty summary, nothing saved for 2024-06-01.");
    }
}
