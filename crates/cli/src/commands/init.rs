// `evo-digest init`: write a default `.evo/monitor.toml`.

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Args;
use evo_monitor::config::{resolve_config_path, MonitorConfig};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub config_path: PathBuf,
    pub overwritten: bool,
}

pub fn run(args: InitArgs, root: &Path) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match write_default_config(root, args.force) {
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

fn write_default_config(root: &Path, force: bool) -> anyhow::Result<InitResult> {
    let config_path = resolve_config_path(root);
    let exists = config_path.exists();
    if exists && !force {
        bail!("config already exists at `{}` (use --force to overwrite)", config_path.display());
    }

    MonitorConfig::default().save_to(&config_path)?;
    Ok(InitResult { config_path, overwritten: exists })
}

fn format_human(result: &InitResult) -> String {
    let verb = if result.overwritten { "Overwrote" } else { "Wrote" };
    format!("{verb} default config at {}", result.config_path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_loadable_default_config() {
        let dir = TempDir::new().unwrap();
        let result = write_default_config(dir.path(), false).unwrap();

        assert!(!result.overwritten);
        assert!(result.config_path.ends_with(".evo/monitor.toml"));
        let loaded = MonitorConfig::load_from(&result.config_path).unwrap();
        assert_eq!(loaded, MonitorConfig::default());
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        write_default_config(dir.path(), false).unwrap();

        let error = write_default_config(dir.path(), false).expect_err("second init should fail");
        assert!(error.to_string().contains("--force"));

        let result = write_default_config(dir.path(), true).unwrap();
        assert!(result.overwritten);
        assert!(format_human(&result).starts_with("Overwrote default config"));
    }
}
