// `git` CLI calls used to publish digests.
//
// Every call goes through a `CommandExecutor`, so tests script git's answers
// without a repository on disk.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitWorkerError {
    #[error("`git {0}` needs a pathspec")]
    EmptyPathspec(&'static str),

    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("`{command}` failed ({}): {}", describe_exit(.code), .stderr.trim())]
    CommandFailed { command: String, code: Option<i32>, stderr: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}

/// What one git invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `git <args>` inside a working tree.
pub trait CommandExecutor: Send + Sync {
    fn run_git(&self, cwd: &Path, args: &[String]) -> io::Result<CommandResult>;
}

/// The `git` binary on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

impl CommandExecutor for SystemGit {
    fn run_git(&self, cwd: &Path, args: &[String]) -> io::Result<CommandResult> {
        let output = Command::new("git").args(args).current_dir(cwd).output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Git operations on one working tree. Pathspecs always follow `--`, so a
/// file name can never be read as an option.
#[derive(Debug, Clone)]
pub struct GitWorker<E = SystemGit> {
    repo_path: PathBuf,
    executor: E,
}

impl GitWorker<SystemGit> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self::with_executor(repo_path, SystemGit)
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Stage everything matching `pathspec`, including deletions.
    pub fn add(&self, pathspec: &str) -> Result<(), GitWorkerError> {
        let pathspec = non_empty("add", pathspec)?;
        self.git(&["add", "--all", "--", pathspec]).map(drop)
    }

    /// Staged paths limited to `pathspec`.
    pub fn staged_paths(&self, pathspec: &str) -> Result<Vec<String>, GitWorkerError> {
        let pathspec = non_empty("diff", pathspec)?;
        let stdout = self.git(&["diff", "--cached", "--name-only", "--", pathspec])?;
        Ok(stdout.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }

    /// Commit only the paths matching `pathspec`; anything else staged in the
    /// index stays staged and out of the commit.
    pub fn commit_pathspec(&self, message: &str, pathspec: &str) -> Result<(), GitWorkerError> {
        let pathspec = non_empty("commit", pathspec)?;
        self.git(&["commit", "-m", message, "--", pathspec]).map(drop)
    }

    /// Push `HEAD` to `remote`, onto `branch` when given.
    pub fn push(&self, remote: &str, branch: Option<&str>) -> Result<(), GitWorkerError> {
        let refspec = branch.map_or_else(|| "HEAD".to_string(), |branch| format!("HEAD:{branch}"));
        self.git(&["push", remote, refspec.as_str()]).map(drop)
    }

    pub fn head_short(&self) -> Result<String, GitWorkerError> {
        Ok(self.git(&["rev-parse", "--short", "HEAD"])?.trim().to_string())
    }

    /// Run git and return its stdout.
    fn git(&self, args: &[&str]) -> Result<String, GitWorkerError> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let command = format!("git {}", args.join(" "));

        let result = self
            .executor
            .run_git(&self.repo_path, &args)
            .map_err(|error| GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() })?;
        if result.success {
            return Ok(result.stdout);
        }

        // Some git failures only explain themselves on stdout.
        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };
        Err(GitWorkerError::CommandFailed { command, code: result.code, stderr })
    }
}

fn non_empty<'a>(command: &'static str, pathspec: &'a str) -> Result<&'a str, GitWorkerError> {
    if pathspec.trim().is_empty() {
        return Err(GitWorkerError::EmptyPathspec(command));
    }
    Ok(pathspec)
}
