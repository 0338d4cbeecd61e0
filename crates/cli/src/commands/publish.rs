// `evo-digest publish`: commit changed digest files and push.

use std::path::Path;

use clap::Args;
use evo_monitor::git::publish::{CommitPublisher, PublishOutcome};
use evo_monitor::git::worker::GitWorker;

use super::{load_config, resolve_date};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Date used in the commit message (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Commit without pushing.
    #[arg(long)]
    no_push: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: PublishArgs, root: &Path) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match execute(&args, root) {
        Ok(outcome) => {
            output::print_output(format, &outcome, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn execute(args: &PublishArgs, root: &Path) -> anyhow::Result<PublishOutcome> {
    let config = load_config(root)?;
    let date = resolve_date(args.date.as_deref(), &config)?;

    let mut git = config.git.clone();
    if args.no_push {
        git.push = false;
    }
    let publisher = CommitPublisher::new(GitWorker::new(root), git);
    Ok(publisher.publish(date)?)
}

fn format_human(outcome: &PublishOutcome) -> String {
    match outcome {
        PublishOutcome::NothingToCommit => "Nothing to commit.".to_string(),
        PublishOutcome::Committed { commit, message, files, pushed } => {
            let mut lines = vec![format!("Committed {commit} \"{message}\"")];
            lines.extend(files.iter().map(|file| format!("  {file}")));
            if *pushed {
                lines.push("Pushed.".to_string());
            }
            lines.join("\n")
        }
    }
}
