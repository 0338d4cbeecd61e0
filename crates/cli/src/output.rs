// Command output: human text on a terminal, one JSON object per line when
// piped or with `--json`. Results go to stdout; errors and warnings to stderr.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;

use crate::exit_code::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// JSON when `--json` is set or stdout is not a terminal.
    pub fn detect(json_flag: bool) -> Self {
        Self::choose(json_flag, io::stdout().is_terminal())
    }

    fn choose(json_flag: bool, stdout_is_tty: bool) -> Self {
        if json_flag || !stdout_is_tty {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Print a command result to stdout.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human)
}

pub fn write_output<W, T, F>(writer: &mut W, format: OutputFormat, value: &T, human: F) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => writeln!(writer, "{}", human(value)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Severity::Error => "\x1b[31m",
            Severity::Warning => "\x1b[33m",
        }
    }
}

/// One stderr line: `warning: ...` for people, `{"warning": {...}}` for machines.
fn render_notice(
    format: OutputFormat,
    severity: Severity,
    code: &str,
    message: &str,
    color: bool,
) -> String {
    match format {
        OutputFormat::Human if color => {
            format!("{}{}:\x1b[0m {message}", severity.color(), severity.label())
        }
        OutputFormat::Human => format!("{}: {message}", severity.label()),
        OutputFormat::Json => serde_json::json!({
            severity.label(): { "code": code, "message": message }
        })
        .to_string(),
    }
}

fn emit(format: OutputFormat, severity: Severity, code: &str, message: &str) {
    let stderr = io::stderr();
    let line = render_notice(format, severity, code, message, stderr.is_terminal());
    let _ = writeln!(stderr.lock(), "{line}");
}

/// Warn about something that did not stop the command, e.g. one source
/// failing during `run`.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    emit(format, Severity::Warning, code, message);
}

/// Report a failed command with a stable code and a hint where one helps.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    emit(format, Severity::Error, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    match ExitCode::from_error(error) {
        ExitCode::Config => {
            let path = first_backticked(&message).unwrap_or(".evo/monitor.toml");
            let hint = format!("{message}. Check {path} or run: evo-digest init");
            ("CONFIG_ERROR", hint)
        }
        ExitCode::Usage => ("INVALID_ARGUMENT", message),
        ExitCode::Network if message.to_ascii_lowercase().contains("timed out") => (
            "NETWORK_TIMEOUT",
            format!("{message}. The source did not answer in time; try again later."),
        ),
        ExitCode::Network => ("NETWORK_ERROR", message),
        ExitCode::Git if message.contains("rejected") || message.contains("non-fast-forward") => (
            "PUSH_REJECTED",
            format!("{message}. Pull the remote branch, then run: evo-digest publish"),
        ),
        ExitCode::Git => ("GIT_ERROR", message),
        ExitCode::Success | ExitCode::Error => ("ERROR", message),
    }
}

fn first_backticked(message: &str) -> Option<&str> {
    message.split('`').nth(1).map(str::trim).filter(|s| !s.is_empty())
}
