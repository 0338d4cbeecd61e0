// Consistent exit codes for the evo-digest CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = config error
//   13 = network error (every source failed, HTTP client setup)
//   14 = git error (add/commit/push)

use std::process;

use evo_digest_common::layout::LayoutError;
use evo_monitor::config::ConfigError;
use evo_monitor::fetch::FetchError;
use evo_monitor::git::publish::PublishError;
use evo_monitor::git::worker::GitWorkerError;
use evo_monitor::notify::NotifyError;
use evo_monitor::pipeline::PipelineError;

use crate::commands::run::SourcesUnavailable;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Config = 10,
    Network = 13,
    Git = 14,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            // Transparent wrappers hide their inner error from the chain, so
            // they are unpacked here.
            if let Some(pipeline) = cause.downcast_ref::<PipelineError>() {
                return Self::from_pipeline(pipeline);
            }
            if let Some(publish) = cause.downcast_ref::<PublishError>() {
                return Self::from_publish(publish);
            }
            if cause.is::<ConfigError>() {
                return Self::Config;
            }
            if cause.is::<LayoutError>() {
                return Self::Usage;
            }
            if cause.is::<FetchError>()
                || cause.is::<NotifyError>()
                || cause.is::<SourcesUnavailable>()
            {
                return Self::Network;
            }
            if cause.is::<GitWorkerError>() {
                return Self::Git;
            }
        }

        Self::Error
    }

    fn from_pipeline(err: &PipelineError) -> Self {
        match err {
            PipelineError::Config(_) => Self::Config,
            PipelineError::Fetch(_) | PipelineError::Notify(_) => Self::Network,
            PipelineError::Publish(publish) => Self::from_publish(publish),
            PipelineError::InvalidUrl { .. } => Self::Config,
            PipelineError::State(_) | PipelineError::Persist(_) => Self::Error,
        }
    }

    fn from_publish(err: &PublishError) -> Self {
        match err {
            PublishError::Git(_) => Self::Git,
            PublishError::Digests(_) => Self::Error,
        }
    }

    /// Exit the process with this code.
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
