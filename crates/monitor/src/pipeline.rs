// One monitoring pass: fetch each source, alert on new items, compose the
// digest, then (optionally) persist and publish it.
//
// A source that fails to fetch is logged and contributes nothing; the other
// sources still run. Persistence and publishing only happen for a non-empty
// summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use evo_digest_common::types::{Alert, Digest, Source};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{jst, webhook_url_from_env, ConfigError, MonitorConfig};
use crate::fetch::{FetchError, HttpFetcher, PageFetcher};
use crate::git::publish::{CommitPublisher, PublishError, PublishOutcome};
use crate::git::worker::GitWorker;
use crate::notify::{deliver, notifier_for, Notifier, NotifyError};
use crate::persist::{persist_summary, PersistError, PersistOutcome};
use crate::sources::{evo_news, exercise, tdnet};
use crate::state::{MonitorState, StateError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("invalid source URL `{url}`: {source}")]
    InvalidUrl { url: String, source: url::ParseError },
}

/// Per-source outcome of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: Source,
    pub alerts: usize,
    /// The source was not scanned (e.g. TDnet outside market hours).
    pub skipped: bool,
    pub error: Option<String>,
}

impl SourceReport {
    fn scanned(source: Source, alerts: usize) -> Self {
        Self { source, alerts, skipped: false, error: None }
    }

    fn skipped(source: Source) -> Self {
        Self { source, alerts: 0, skipped: true, error: None }
    }

    fn failed(source: Source, error: impl ToString) -> Self {
        Self { source, alerts: 0, skipped: false, error: Some(error.to_string()) }
    }
}

/// Knobs for a single pass.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wall-clock instant of the run.
    pub now: DateTime<Utc>,
    /// Digest date override; defaults to `now` in the configured offset.
    pub date: Option<NaiveDate>,
    /// Skip TDnet outside market hours.
    pub market_hours_only: bool,
    /// Also read the previous JST day's TDnet listing, so filings posted
    /// after yesterday's run are not missed.
    pub previous_day: bool,
    /// Deliver alerts to the notifier.
    pub notify: bool,
}

impl RunOptions {
    /// A once-a-day pass: no market-hours gate, yesterday's listing included.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, date: None, market_hours_only: false, previous_day: true, notify: true }
    }

    /// A pass from the long-running monitor: market hours only, today's
    /// listing only.
    pub fn scheduled(now: DateTime<Utc>) -> Self {
        Self { now, date: None, market_hours_only: true, previous_day: false, notify: true }
    }

    /// JST dates whose TDnet listings this pass reads, oldest first.
    pub fn listing_days(&self) -> Vec<NaiveDate> {
        let today = self.now.with_timezone(&jst()).date_naive();
        match today.pred_opt() {
            Some(yesterday) if self.previous_day => vec![yesterday, today],
            _ => vec![today],
        }
    }
}

/// Everything a pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub sources: Vec<SourceReport>,
    pub alerts: Vec<Alert>,
    /// The digest text; empty when nothing new was found.
    pub summary: String,
}

impl RunReport {
    pub fn digest(&self) -> Digest {
        Digest::new(self.date, self.alerts.clone())
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// What happened after the summary was known.
#[derive(Debug, Clone, Serialize)]
pub struct FinishReport {
    pub persisted: Option<PathBuf>,
    pub replaced: bool,
    pub published: Option<PublishOutcome>,
}

/// Source scanning with its collaborators.
pub struct Monitor {
    repo_root: PathBuf,
    config: MonitorConfig,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
}

impl Monitor {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        config: MonitorConfig,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { repo_root: repo_root.into(), config, fetcher, notifier }
    }

    /// HTTP fetcher plus the Discord webhook from `DISCORD_WEBHOOK_URL`, or
    /// the console when the variable is unset.
    pub fn from_env(repo_root: impl Into<PathBuf>, config: MonitorConfig) -> Result<Self, PipelineError> {
        let fetcher =
            HttpFetcher::new(Duration::from_secs(config.sources.request_timeout_sec))?;
        let webhook = webhook_url_from_env();
        if webhook.is_none() {
            warn!("DISCORD_WEBHOOK_URL not set, alerts will be printed");
        }
        let notifier =
            notifier_for(webhook.as_deref(), Duration::from_secs(config.notify.timeout_sec))?;
        Ok(Self::new(repo_root, config, Arc::new(fetcher), Arc::from(notifier)))
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn state_path(&self) -> PathBuf {
        self.repo_root.join(&self.config.digest.state_file)
    }

    pub fn load_state(&self) -> Result<MonitorState, StateError> {
        MonitorState::load(&self.state_path())
    }

    pub fn save_state(&self, state: &MonitorState) -> Result<(), StateError> {
        state.save(&self.state_path())
    }

    /// Calendar date a run at `now` belongs to.
    pub fn digest_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.digest.offset()).date_naive()
    }

    fn parse_url(raw: &str) -> Result<Url, PipelineError> {
        Url::parse(raw).map_err(|source| PipelineError::InvalidUrl { url: raw.to_string(), source })
    }

    async fn announce(&self, alerts: &[Alert], notify: bool) {
        if !notify {
            return;
        }
        for alert in alerts {
            deliver(self.notifier.as_ref(), &alert.chat_message()).await;
        }
    }

    /// Scan the news page; returns the new alerts (already delivered when
    /// `notify` is set).
    pub async fn scan_news(
        &self,
        state: &mut MonitorState,
        notify: bool,
    ) -> Result<(SourceReport, Vec<Alert>), PipelineError> {
        let sources = &self.config.sources;
        let page_url = Self::parse_url(&sources.evo_news_url)?;
        info!(url = %page_url, "scanning EVO news page");

        let html = match self.fetcher.fetch(page_url.as_str()).await {
            Ok(html) => html,
            Err(error) => {
                warn!(%error, "EVO news fetch failed");
                return Ok((SourceReport::failed(Source::EvoNews, error), Vec::new()));
            }
        };

        let alerts = evo_news::scan(&html, &page_url, &sources.keywords, state);
        self.announce(&alerts, notify).await;
        Ok((SourceReport::scanned(Source::EvoNews, alerts.len()), alerts))
    }

    /// Fetch and parse the listings for `days`. A day that fails is logged
    /// and skipped; only when every day fails is the last error returned.
    async fn fetch_listings(
        &self,
        days: &[NaiveDate],
    ) -> Result<Result<Vec<tdnet::ListingEntry>, FetchError>, PipelineError> {
        let mut entries = Vec::new();
        let mut last_error = None;
        let mut fetched = 0usize;

        for day in days {
            let raw = tdnet::listing_url(&self.config.sources.tdnet_base_url, *day);
            let listing_url = Self::parse_url(&raw)?;
            match self.fetcher.fetch(listing_url.as_str()).await {
                Ok(html) => {
                    fetched += 1;
                    entries.extend(tdnet::parse_listing(&html, &listing_url));
                }
                Err(error) => {
                    warn!(%day, %error, "TDnet listing fetch failed");
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) if fetched == 0 => Ok(Err(error)),
            _ => Ok(Ok(entries)),
        }
    }

    /// Scan the TDnet listings for EVO-related PDFs.
    pub async fn scan_tdnet(
        &self,
        options: &RunOptions,
        state: &mut MonitorState,
    ) -> Result<(SourceReport, Vec<Alert>), PipelineError> {
        let sources = &self.config.sources;
        let now_jst = options.now.with_timezone(&jst());
        if options.market_hours_only
            && !tdnet::in_market_hours(now_jst, sources.market_open_hour, sources.market_close_hour)
        {
            return Ok((SourceReport::skipped(Source::Tdnet), Vec::new()));
        }

        let days = options.listing_days();
        info!(?days, "scanning TDnet listing");
        let entries = match self.fetch_listings(&days).await? {
            Ok(entries) => entries,
            Err(error) => return Ok((SourceReport::failed(Source::Tdnet, error), Vec::new())),
        };

        let alerts = tdnet::scan(&entries, &sources.tdnet_url_markers, state);
        self.announce(&alerts, options.notify).await;
        Ok((SourceReport::scanned(Source::Tdnet, alerts.len()), alerts))
    }

    /// Check the listings for exercise status filings crossing a threshold.
    pub async fn scan_exercise(
        &self,
        options: &RunOptions,
        state: &mut MonitorState,
    ) -> Result<(SourceReport, Vec<Alert>), PipelineError> {
        let days = options.listing_days();
        info!(?days, "checking exercise status filings");
        let entries = match self.fetch_listings(&days).await? {
            Ok(entries) => entries,
            Err(error) => return Ok((SourceReport::failed(Source::Exercise, error), Vec::new())),
        };

        let alerts = exercise::scan(&entries, state);
        self.announce(&alerts, options.notify).await;
        Ok((SourceReport::scanned(Source::Exercise, alerts.len()), alerts))
    }

    /// Run every source once, persist the dedup state, compose the digest.
    pub async fn run_once(&self, options: &RunOptions) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let date = options.date.unwrap_or_else(|| self.digest_date(options.now));
        info!(%run_id, %date, "monitor pass started");

        let mut state = self.load_state()?;
        let mut sources = Vec::with_capacity(3);
        let mut alerts = Vec::new();

        let (report, found) = self.scan_news(&mut state, options.notify).await?;
        sources.push(report);
        alerts.extend(found);
        self.save_state(&state)?;

        let (report, found) = self.scan_tdnet(options, &mut state).await?;
        sources.push(report);
        alerts.extend(found);
        self.save_state(&state)?;

        let (report, found) = self.scan_exercise(options, &mut state).await?;
        sources.push(report);
        alerts.extend(found);
        self.save_state(&state)?;

        let summary = Digest::new(date, alerts.clone()).render_markdown();
        info!(%run_id, alerts = alerts.len(), "monitor pass finished");
        Ok(RunReport { run_id, date, sources, alerts, summary })
    }
}

/// Persist a non-empty summary and, when `commit` is set, publish it.
///
/// Neither step touches the webhook, so a missing `DISCORD_WEBHOOK_URL`
/// cannot affect them.
pub fn finish(
    repo_root: &Path,
    config: &MonitorConfig,
    date: NaiveDate,
    summary: &str,
    commit: bool,
) -> Result<FinishReport, PipelineError> {
    let outcome = persist_summary(repo_root, date, summary)?;
    let (persisted, replaced) = match outcome {
        PersistOutcome::Skipped => {
            return Ok(FinishReport { persisted: None, replaced: false, published: None });
        }
        PersistOutcome::Written { path, replaced } => (path, replaced),
    };

    let published = if commit {
        let publisher = CommitPublisher::new(GitWorker::new(repo_root), config.git.clone());
        Some(publisher.publish(date)?)
    } else {
        None
    };

    Ok(FinishReport { persisted: Some(persisted), replaced, published })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves fixed pages by URL; anything else is a 404.
    pub(crate) struct CannedFetcher {
        pages: HashMap<String, String>,
    }

    impl CannedFetcher {
        pub(crate) fn new(pages: &[(&str, &str)]) -> Self {
            Self { pages: pages.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }
        }
    }

    impl PageFetcher for CannedFetcher {
        fn fetch(
            &self,
            url: &str,
        ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send>> {
            let result = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status { url: url.to_string(), status: 404 });
            Box::pin(async move { result })
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) sent: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(
            &self,
            content: &str,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>> {
            self.sent.lock().expect("notifier lock poisoned").push(content.to_string());
            Box::pin(async { Ok(()) })
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    pub(crate) const NEWS: &str = r#"<div class="news-list"><ul>
        <li><a href="/n/1">EVO FUND 割当のお知らせ</a></li>
        <li><a href="/n/2">社内イベント</a></li>
    </ul></div>"#;

    const LISTING: &str = r#"<table>
        <tr><td class="kjName">ACME</td><td><a href="evo_0601.pdf">割当</a></td></tr>
        <tr><td class="kjName">ACME</td><td><a href="x_0601.pdf">月間行使状況（残行使率 9%）</a></td></tr>
    </table>"#;

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.sources.evo_news_url = "https://news.test/ejs/news/".into();
        config.sources.tdnet_base_url = "https://tdnet.test".into();
        config
    }

    // 2024-06-01 10:00 JST
    fn morning_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap()
    }

    fn monitor(dir: &TempDir, pages: &[(&str, &str)]) -> (Monitor, Arc<RecordingNotifier>) {
        let fetcher = CannedFetcher::new(pages);
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(dir.path(), config(), Arc::new(fetcher), notifier.clone());
        (monitor, notifier)
    }

    #[tokio::test]
    async fn run_once_collects_all_sources_and_notifies() {
        let dir = TempDir::new().unwrap();
        let (monitor, notifier) = monitor(
            &dir,
            &[
                ("https://news.test/ejs/news/", NEWS),
                ("https://tdnet.test/old/202406/01/index.html", LISTING),
            ],
        );

        let report = monitor.run_once(&RunOptions::at(morning_utc())).await.unwrap();

        assert_eq!(report.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(report.alerts.len(), 3);
        assert_eq!(report.failed_sources(), 0);
        assert!(report.summary.starts_with("# EVO digest 2024-06-01\n"));
        assert!(report.summary.contains("[EVO NEWS] EVO FUND 割当のお知らせ"));
        assert!(report.summary.contains("https://tdnet.test/old/202406/01/evo_0601.pdf"));
        assert!(report.summary.contains("[EXERCISE] ACME 残行使率 9% (≤10%)"));
        assert_eq!(notifier.sent.lock().unwrap().len(), 3);
        assert!(monitor.state_path().exists());
    }

    #[tokio::test]
    async fn second_run_has_empty_summary() {
        let dir = TempDir::new().unwrap();
        let (monitor, _) = monitor(
            &dir,
            &[
                ("https://news.test/ejs/news/", NEWS),
                ("https://tdnet.test/old/202406/01/index.html", LISTING),
            ],
        );

        monitor.run_once(&RunOptions::at(morning_utc())).await.unwrap();
        let second = monitor.run_once(&RunOptions::at(morning_utc())).await.unwrap();
        assert!(second.alerts.is_empty());
        assert_eq!(second.summary, "");
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let (monitor, _) = monitor(&dir, &[("https://news.test/ejs/news/", NEWS)]);

        let report = monitor.run_once(&RunOptions::at(morning_utc())).await.unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.failed_sources(), 2);
        assert!(report.sources[1].error.as_deref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn tdnet_respects_market_hours_when_asked() {
        let dir = TempDir::new().unwrap();
        let (monitor, _) = monitor(&dir, &[("https://tdnet.test/old/202406/01/index.html", LISTING)]);
        let mut state = MonitorState::default();
        // 2024-06-01 20:00 JST
        let evening = Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap();

        let mut options = RunOptions::scheduled(evening);
        options.notify = false;
        let (report, alerts) = monitor.scan_tdnet(&options, &mut state).await.unwrap();
        assert!(report.skipped);
        assert!(alerts.is_empty());

        options.market_hours_only = false;
        let (report, alerts) = monitor.scan_tdnet(&options, &mut state).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn one_shot_pass_reads_yesterday_and_today() {
        // 2024-06-01 00:30 UTC is 09:30 JST on 2024-06-01.
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 30, 0).unwrap();
        let may_31 = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let june_1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert_eq!(RunOptions::at(now).listing_days(), vec![may_31, june_1]);
        assert_eq!(RunOptions::scheduled(now).listing_days(), vec![june_1]);
    }

    #[tokio::test]
    async fn evening_filings_from_yesterday_are_picked_up() {
        let dir = TempDir::new().unwrap();
        let yesterday = r#"<table>
            <tr><td class="kjName">ACME</td><td><a href="evo_0531.pdf">第三者割当</a></td></tr>
        </table>"#;
        let (monitor, _) = monitor(
            &dir,
            &[
                ("https://tdnet.test/old/202405/31/index.html", yesterday),
                ("https://tdnet.test/old/202406/01/index.html", LISTING),
            ],
        );

        let report = monitor.run_once(&RunOptions::at(morning_utc())).await.unwrap();
        assert_eq!(report.sources[1].alerts, 2);
        assert!(report.summary.contains("https://tdnet.test/old/202405/31/evo_0531.pdf"));
        assert!(report.summary.contains("https://tdnet.test/old/202406/01/evo_0601.pdf"));
    }

    #[tokio::test]
    async fn missing_listing_for_one_day_is_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let (monitor, _) = monitor(&dir, &[("https://tdnet.test/old/202406/01/index.html", LISTING)]);
        let mut state = MonitorState::default();
        let mut options = RunOptions::at(morning_utc());
        options.notify = false;

        let (report, alerts) = monitor.scan_tdnet(&options, &mut state).await.unwrap();
        assert!(report.error.is_none());
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn no_notify_still_records_state() {
        let dir = TempDir::new().unwrap();
        let (monitor, notifier) = monitor(&dir, &[("https://news.test/ejs/news/", NEWS)]);
        let mut options = RunOptions::at(morning_utc());
        options.notify = false;

        let report = monitor.run_once(&options).await.unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(monitor.load_state().unwrap().has_news("https://news.test/n/1"));
    }

    #[test]
    fn digest_date_uses_configured_offset() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, _) = monitor(&dir, &[]);
        // 2024-06-01 20:00 UTC is already 2024-06-02 in JST.
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        assert_eq!(monitor.digest_date(late), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        monitor.config.digest.utc_offset_hours = 9;
        assert_eq!(monitor.digest_date(late), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
    }

    #[test]
    fn finish_skips_everything_for_empty_summary() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        // `commit` is set but no git repo exists: the call must not reach git.
        let report = finish(dir.path(), &config(), date, "", true).unwrap();
        assert!(report.persisted.is_none());
        assert!(report.published.is_none());
        assert!(!dir.path().join("daily").exists());
    }

    #[test]
    fn finish_without_commit_only_writes_file() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let report = finish(dir.path(), &config(), date, "Evo update: X released", false).unwrap();
        assert_eq!(
            report.persisted.as_deref(),
            Some(dir.path().join("daily/EVO_DIGEST_2024-06-01.md").as_path())
        );
        assert!(report.published.is_none());
    }
}
