// `evo-digest status`: config, dedup state and stored digests at a glance.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Args;
use evo_monitor::config::{resolve_config_path, webhook_url_from_env};
use evo_monitor::persist::list_digests;
use evo_monitor::state::MonitorState;
use serde::Serialize;

use super::load_config;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config_present: bool,
    /// Only whether a webhook is set; the URL itself is never printed.
    pub webhook_configured: bool,
    pub state_path: PathBuf,
    pub seen_news: usize,
    pub seen_filings: usize,
    pub exercise_flags: usize,
    pub digests: usize,
    pub latest_digest: Option<NaiveDate>,
}

pub fn run(args: StatusArgs, root: &Path) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match collect(root, webhook_url_from_env().is_some()) {
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

fn collect(root: &Path, webhook_configured: bool) -> anyhow::Result<StatusResult> {
    let config = load_config(root)?;
    let config_path = resolve_config_path(root);
    let state_path = root.join(&config.digest.state_file);
    let state = MonitorState::load(&state_path)?;
    let digests = list_digests(root)?;

    Ok(StatusResult {
        root: root.to_path_buf(),
        config_present: config_path.exists(),
        config_path,
        webhook_configured,
        state_path,
        seen_news: state.evo_news.len(),
        seen_filings: state.tdnet.len(),
        exercise_flags: state.exercise_flags.len(),
        digests: digests.len(),
        latest_digest: digests.iter().map(|(date, _)| *date).max(),
    })
}

fn format_human(result: &StatusResult) -> String {
    let config = if result.config_present { "" } else { " (missing, using defaults)" };
    let webhook = if result.webhook_configured { "configured" } else { "not set (console only)" };
    let latest = result
        .latest_digest
        .map(|date| format!(", latest {date}"))
        .unwrap_or_default();

    [
        format!("Root:     {}", result.root.display()),
        format!("Config:   {}{config}", result.config_path.display()),
        format!("Webhook:  {webhook}"),
        format!(
            "State:    {} news, {} filings, {} exercise flags",
            result.seen_news, result.seen_filings, result.exercise_flags
        ),
        format!("Digests:  {}{latest}", result.digests),
    ]
    .join("\n")
}
