// `evo-digest run`: one monitoring pass over every source.
//
// The summary goes to `$GITHUB_OUTPUT` when running inside Actions so the
// later save/commit steps can be gated on it being non-empty.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Args;
use evo_monitor::action_output::export_summary;
use evo_monitor::git::publish::PublishOutcome;
use evo_monitor::pipeline::{finish, Monitor, RunOptions, RunReport, SourceReport};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{block_on, load_config, resolve_date};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Digest date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Also write the digest file when the summary is non-empty.
    #[arg(long)]
    save: bool,

    /// Commit and push the digest after saving.
    #[arg(long, requires = "save")]
    commit: bool,

    /// Collect alerts without posting them to the webhook.
    #[arg(long)]
    no_notify: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

/// Every source failed to fetch; the pass has nothing trustworthy to report.
#[derive(Debug)]
pub struct SourcesUnavailable {
    pub failed: usize,
}

impl fmt::Display for SourcesUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all {} sources failed to fetch", self.failed)
    }
}

impl std::error::Error for SourcesUnavailable {}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub sources: Vec<SourceReport>,
    pub alerts: usize,
    pub summary: String,
    /// The summary was written to `$GITHUB_OUTPUT`.
    pub exported: bool,
    pub persisted: Option<PathBuf>,
    pub published: Option<PublishOutcome>,
}

pub fn run(args: RunArgs, root: &Path) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match execute(&args, root) {
        Ok(result) => {
            for source in result.sources.iter().filter(|s| s.error.is_some()) {
                let error = source.error.as_deref().unwrap_or_default();
                output::print_warning(
                    format,
                    "SOURCE_FAILED",
                    &format!("{} skipped this run: {error}", source.source.tag()),
                );
            }
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn execute(args: &RunArgs, root: &Path) -> anyhow::Result<RunResult> {
    let config = load_config(root)?;
    let date = resolve_date(args.date.as_deref(), &config)?;
    let monitor = Monitor::from_env(root, config).context("failed to set up monitor")?;

    let mut options = RunOptions::at(Utc::now());
    options.date = Some(date);
    options.notify = !args.no_notify;

    let report = block_on(monitor.run_once(&options))??;
    check_sources(&report)?;

    let exported = export_summary(&report.summary).context("failed to write step output")?;
    let (persisted, published) = if args.save {
        let finished = finish(root, monitor.config(), date, &report.summary, args.commit)?;
        (finished.persisted, finished.published)
    } else {
        (None, None)
    };

    info!(run_id = %report.run_id, alerts = report.alerts.len(), exported, "run finished");
    Ok(RunResult {
        run_id: report.run_id,
        date: report.date,
        alerts: report.alerts.len(),
        sources: report.sources,
        summary: report.summary,
        exported,
        persisted,
        published,
    })
}

fn check_sources(report: &RunReport) -> Result<(), SourcesUnavailable> {
    let failed = report.failed_sources();
    if failed > 0 && failed == report.sources.len() {
        return Err(SourcesUnavailable { failed });
    }
    Ok(())
}

fn format_human(result: &RunResult) -> String {
    let mut lines = Vec::new();
    for source in &result.sources {
        let status = match (&source.error, source.skipped) {
            (Some(error), _) => format!("failed ({error})"),
            (None, true) => "skipped".to_string(),
            (None, false) => format!("{} new", source.alerts),
        };
        lines.push(format!("{}: {status}", source.source.tag()));
    }

    if result.summary.is_empty() {
        lines.push(format!("No new items for {}.", result.date));
    } else if !result.exported {
        lines.push(String::new());
        lines.push(result.summary.trim_end().to_string());
    }

    if let Some(path) = &result.persisted {
        lines.push(format!("Saved {}", path.display()));
    }
    match &result.published {
        Some(PublishOutcome::Committed { commit, message, pushed, .. }) => {
            let pushed = if *pushed { ", pushed" } else { "" };
            lines.push(format!("Committed {commit} \"{message}\"{pushed}"));
        }
        Some(PublishOutcome::NothingToCommit) => lines.push("Nothing to commit.".to_string()),
        None => {}
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_digest_common::types::Source;

    fn source(source: Source, alerts: usize, error: Option<&str>) -> SourceReport {
        SourceReport { source, alerts, skipped: false, error: error.map(str::to_string) }
    }

    fn sample_result() -> RunResult {
        RunResult {
            run_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            sources: vec![
                source(Source::EvoNews, 1, None),
                source(Source::Tdnet, 0, Some("https://release.tdnet.info answered HTTP 503")),
                SourceReport { source: Source::Exercise, alerts: 0, skipped: true, error: None },
            ],
            alerts: 1,
            summary: "# EVO digest 2024-06-01\n\n- [EVO NEWS] X released\n".to_string(),
            exported: false,
            persisted: Some(PathBuf::from("/repo/daily/EVO_DIGEST_2024-06-01.md")),
            published: Some(PublishOutcome::Committed {
                commit: "abc1234".to_string(),
                message: "Add daily digest 2024-06-01".to_string(),
                files: vec!["daily/EVO_DIGEST_2024-06-01.md".to_string()],
                pushed: true,
            }),
        }
    }

    fn report_with(sources: Vec<SourceReport>) -> RunReport {
        RunReport {
            run_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            sources,
            alerts: Vec::new(),
            summary: String::new(),
        }
    }

    #[test]
    fn human_format_lists_sources_and_summary() {
        let output = format_human(&sample_result());
        assert!(output.contains("[EVO NEWS]: 1 new"));
        assert!(output.contains("[TDNET]: failed (https://release.tdnet.info answered HTTP 503)"));
        assert!(output.contains("[EXERCISE]: skipped"));
        assert!(output.contains("- [EVO NEWS] X released"));
        assert!(output.contains("Saved /repo/daily/EVO_DIGEST_2024-06-01.md"));
        assert!(output.contains("Committed abc1234 \"Add daily digest 2024-06-01\", pushed"));
    }

    #[test]
    fn human_format_hides_exported_summary() {
        let mut result = sample_result();
        result.exported = true;
        assert!(!format_human(&result).contains("X released"));
    }

    #[test]
    fn human_format_reports_empty_run() {
        let mut result = sample_result();
        result.summary.clear();
        result.persisted = None;
        result.published = None;
        let output = format_human(&result);
        assert!(output.contains("No new items for 2024-06-01."));
        assert!(!output.contains("Saved"));
    }

    #[test]
    fn partial_failure_is_not_fatal() {
        let report = report_with(vec![
            source(Source::EvoNews, 0, None),
            source(Source::Tdnet, 0, Some("503")),
            source(Source::Exercise, 0, Some("503")),
        ]);
        assert!(check_sources(&report).is_ok());
    }

    #[test]
    fn total_failure_is_fatal() {
        let report = report_with(vec![
            source(Source::EvoNews, 0, Some("timeout")),
            source(Source::Tdnet, 0, Some("503")),
            source(Source::Exercise, 0, Some("503")),
        ]);
        let error = check_sources(&report).expect_err("all failed should be an error");
        assert_eq!(error.failed, 3);
        assert!(error.to_string().contains("all 3 sources failed"));
    }

    #[test]
    fn json_format_carries_summary() {
        let result = sample_result();
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, format_human)
            .expect("json output should serialize");

        let parsed: serde_json::Value =
            serde_json::from_slice(&buf).expect("json output should deserialize");
        assert_eq!(parsed["date"], "2024-06-01");
        assert_eq!(parsed["alerts"], 1);
        assert_eq!(parsed["published"]["status"], "committed");
        assert!(parsed["summary"].as_str().unwrap().contains("X released"));
    }
}
