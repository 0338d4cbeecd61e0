// CLI subcommand dispatch and shared helpers.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use evo_digest_common::layout::parse_digest_date;
use evo_monitor::config::{resolve_config_path, MonitorConfig};

pub mod init;
pub mod publish;
pub mod run;
pub mod save;
pub mod status;

#[derive(Subcommand)]
pub enum Command {
    /// Scan every source once and print (or export) the digest summary
    Run(run::RunArgs),
    /// Write a summary to `daily/EVO_DIGEST_<date>.md`
    Save(save::SaveArgs),
    /// Commit and push changed digest files
    Publish(publish::PublishArgs),
    /// Show config, dedup state and stored digests
    Status(status::StatusArgs),
    /// Write a default `.evo/monitor.toml`
    Init(init::InitArgs),
}

pub fn run(cmd: Command, root: Option<PathBuf>) -> anyhow::Result<()> {
    let root = resolve_root(root)?;
    match cmd {
        Command::Run(args) => run::run(args, &root),
        Command::Save(args) => save::run(args, &root),
        Command::Publish(args) => publish::run(args, &root),
        Command::Status(args) => status::run(args, &root),
        Command::Init(args) => init::run(args, &root),
    }
}

fn resolve_root(root: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let provided = root.unwrap_or_else(|| PathBuf::from("."));
    if provided.is_absolute() {
        return Ok(provided);
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(provided))
        .context("failed to resolve current working directory")
}

pub(crate) fn load_config(root: &Path) -> anyhow::Result<MonitorConfig> {
    MonitorConfig::load(root).with_context(|| {
        format!("failed to load config from `{}`", resolve_config_path(root).display())
    })
}

/// `--date` if given, otherwise today in the configured digest offset.
pub(crate) fn resolve_date(
    date: Option<&str>,
    config: &MonitorConfig,
) -> anyhow::Result<NaiveDate> {
    match date {
        Some(raw) => Ok(parse_digest_date(raw)?),
        None => Ok(Utc::now().with_timezone(&config.digest.offset()).date_naive()),
    }
}

/// Drive a future to completion from synchronous command code.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}
