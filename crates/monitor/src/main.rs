// evo-monitord: long-running monitor entry point.

use std::path::PathBuf;

use anyhow::Context;
use evo_monitor::config::MonitorConfig;
use evo_monitor::pipeline::Monitor;
use evo_monitor::schedule;
use tracing::info;

const ROOT_ENV: &str = "EVO_DIGEST_ROOT";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let repo_root = match std::env::var_os(ROOT_ENV) {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let config = MonitorConfig::load(&repo_root).context("failed to load monitor config")?;
    let monitor =
        Monitor::from_env(&repo_root, config).context("failed to set up monitor collaborators")?;

    info!(repo_root = %repo_root.display(), "starting evo monitor");
    schedule::run(monitor, schedule::ctrl_c())
        .await
        .context("monitor scheduler terminated unexpectedly")
}
