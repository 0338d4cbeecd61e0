// Commit publisher: stage `daily/*.md`, commit "Add daily digest <date>", push.

use chrono::NaiveDate;
use evo_digest_common::layout::{commit_message, DIGEST_GIT_PATHSPEC};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::worker::{CommandExecutor, GitWorker, GitWorkerError, SystemGit};
use crate::config::GitConfig;
use crate::persist::{list_digests, PersistError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Git(#[from] GitWorkerError),

    #[error(transparent)]
    Digests(#[from] PersistError),
}

/// Result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// No digest changes were staged; no commit and no push happened.
    NothingToCommit,
    Committed { commit: String, message: String, files: Vec<String>, pushed: bool },
}

#[derive(Debug, Clone)]
pub struct CommitPublisher<E = SystemGit> {
    worker: GitWorker<E>,
    config: GitConfig,
}

impl CommitPublisher<SystemGit> {
    pub fn new(worker: GitWorker<SystemGit>, config: GitConfig) -> Self {
        Self { worker, config }
    }
}

impl<E: CommandExecutor> CommitPublisher<E> {
    pub fn with_worker(worker: GitWorker<E>, config: GitConfig) -> Self {
        Self { worker, config }
    }

    /// Commit every changed digest file and push.
    ///
    /// Only paths matching `daily/*.md` are staged and committed, even when
    /// other changes are already staged in the index. Markdown in
    /// subdirectories of `daily/` is left alone.
    pub fn publish(&self, date: NaiveDate) -> Result<PublishOutcome, PublishError> {
        if list_digests(self.worker.repo_path())?.is_empty() {
            info!("no digest files on disk, nothing to publish");
            return Ok(PublishOutcome::NothingToCommit);
        }

        self.worker.add(DIGEST_GIT_PATHSPEC)?;
        let files = self.worker.staged_paths(DIGEST_GIT_PATHSPEC)?;
        if files.is_empty() {
            info!("digest unchanged, skipping commit");
            return Ok(PublishOutcome::NothingToCommit);
        }

        let message = commit_message(date);
        self.worker.commit_pathspec(&message, DIGEST_GIT_PATHSPEC)?;
        let commit = self.worker.head_short()?;

        let pushed = if self.config.push {
            self.worker.push(&self.config.remote, self.config.branch.as_deref())?;
            true
        } else {
            false
        };

        info!(%commit, files = files.len(), pushed, "digest committed");
        Ok(PublishOutcome::Committed { commit, message, files, pushed })
    }
}
