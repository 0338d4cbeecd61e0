// Chat delivery: Discord webhook, or stdout when no webhook is configured.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Discord rejects message content longer than this many characters.
pub const DISCORD_CONTENT_LIMIT: usize = 2000;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build webhook client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("webhook post failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("webhook answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Delivers one chat message.
pub trait Notifier: Send + Sync {
    fn send(&self, content: &str) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts `{"content": ...}` to a Discord webhook URL.
#[derive(Clone)]
pub struct DiscordWebhook {
    client: reqwest::Client,
    url: String,
}

impl std::fmt::Debug for DiscordWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL embeds the webhook token.
        f.debug_struct("DiscordWebhook").field("url", &"[REDACTED]").finish()
    }
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client =
            reqwest::Client::builder().timeout(timeout).build().map_err(NotifyError::Client)?;
        Ok(Self { client, url: url.into() })
    }
}

impl Notifier for DiscordWebhook {
    fn send(&self, content: &str) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>> {
        let client = self.client.clone();
        let url = self.url.clone();
        let content = content.to_string();
        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&WebhookPayload { content: &content })
                .send()
                .await
                // The URL carries the webhook token; keep it out of the error.
                .map_err(|error| NotifyError::Request(error.without_url()))?;

            let status = response.status();
            if status.is_success() {
                debug!(status = status.as_u16(), "webhook message delivered");
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Status { status: status.as_u16(), body })
        })
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

/// Fallback when no webhook URL is set: logs a warning and prints the message
/// to stderr (stdout belongs to command output).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, content: &str) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>> {
        warn!("DISCORD_WEBHOOK_URL not set, printing instead");
        eprintln!("{content}");
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Pick the webhook when a URL is available, otherwise the console.
pub fn notifier_for(
    webhook_url: Option<&str>,
    timeout: Duration,
) -> Result<Box<dyn Notifier>, NotifyError> {
    match webhook_url {
        Some(url) => Ok(Box::new(DiscordWebhook::new(url, timeout)?)),
        None => Ok(Box::new(ConsoleNotifier)),
    }
}

/// Split `content` into chunks of at most `limit` characters, breaking on
/// line boundaries where possible.
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        for piece in chars.chunks(limit) {
            chunks.push(piece.iter().collect());
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.into_iter().map(|c| c.trim_end_matches('\n').to_string()).filter(|c| !c.is_empty()).collect()
}

/// Deliver a message, splitting it to fit the chat limit. Delivery errors are
/// logged and swallowed so a broken webhook never aborts a scan. Returns the
/// number of chunks that were delivered.
pub async fn deliver(notifier: &dyn Notifier, content: &str) -> usize {
    let mut delivered = 0;
    for chunk in split_message(content, DISCORD_CONTENT_LIMIT) {
        match notifier.send(&chunk).await {
            Ok(()) => delivered += 1,
            Err(error) => warn!(notifier = notifier.name(), %error, "webhook post failed"),
        }
    }
    delivered
}
