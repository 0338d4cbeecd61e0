// Long-running monitor loop.
//
//   every news_interval_min      → news page scan
//   every tdnet_interval_min     → TDnet scan (market hours only)
//   daily at exercise_at (JST)   → exercise status check
//   daily at digest_at (JST)     → write + commit the day's digest
//
// All jobs run on one task, so scans never overlap and the state file has a
// single writer. Alerts waiting for the digest are kept in the state file, so
// a restart before the digest time loses nothing.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};
use evo_digest_common::types::Digest;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::jst;
use crate::notify::deliver;
use crate::pipeline::{finish, Monitor, PipelineError, RunOptions};
use crate::state::MonitorState;

const STARTED_MESSAGE: &str = "✅ EVO Monitor started";

/// Time from `now` until the next occurrence of `at` in `now`'s offset.
/// A time equal to `now` counts as the next day's occurrence.
pub fn until_next(now: DateTime<FixedOffset>, at: NaiveTime) -> Duration {
    let offset = *now.offset();
    let today = now.date_naive();
    let mut target = today.and_time(at);
    if target <= now.naive_local() {
        target = today
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(at))
            .unwrap_or(target);
    }
    let target = offset.from_local_datetime(&target).single().unwrap_or(now);
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

fn next_deadline(at: NaiveTime) -> Instant {
    Instant::now() + until_next(Utc::now().with_timezone(&jst()), at)
}

/// Run the scheduler until `shutdown` resolves.
pub async fn run(
    monitor: Monitor,
    shutdown: impl Future<Output = ()>,
) -> Result<(), PipelineError> {
    let schedule = monitor.config().schedule.clone();
    let exercise_at = schedule.exercise_time()?;
    let digest_at = schedule.digest_time()?;

    let mut state = monitor.load_state()?;
    if !state.pending_digest.is_empty() {
        info!(pending = state.pending_digest.len(), "resuming with undigested alerts");
    }

    if monitor.config().notify.announce_start {
        deliver(monitor.notifier(), STARTED_MESSAGE).await;
    }
    info!(
        news_min = schedule.news_interval_min,
        tdnet_min = schedule.tdnet_interval_min,
        %exercise_at,
        %digest_at,
        "monitor scheduler started"
    );

    let mut news_tick = interval(Duration::from_secs(schedule.news_interval_min * 60));
    news_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tdnet_tick = interval(Duration::from_secs(schedule.tdnet_interval_min * 60));
    tdnet_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exercise_sleep = tokio::time::sleep_until(next_deadline(exercise_at));
    let digest_sleep = tokio::time::sleep_until(next_deadline(digest_at));
    tokio::pin!(exercise_sleep, digest_sleep, shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("monitor scheduler stopping");
                break;
            }
            _ = news_tick.tick() => {
                match monitor.scan_news(&mut state, true).await {
                    Ok((_, alerts)) => state.pending_digest.extend(alerts),
                    Err(error) => error!(%error, "news scan failed"),
                }
                persist_state(&monitor, &state);
            }
            _ = tdnet_tick.tick() => {
                match monitor.scan_tdnet(&RunOptions::scheduled(Utc::now()), &mut state).await {
                    Ok((_, alerts)) => state.pending_digest.extend(alerts),
                    Err(error) => error!(%error, "TDnet scan failed"),
                }
                persist_state(&monitor, &state);
            }
            _ = &mut exercise_sleep => {
                match monitor.scan_exercise(&RunOptions::scheduled(Utc::now()), &mut state).await {
                    Ok((_, alerts)) => state.pending_digest.extend(alerts),
                    Err(error) => error!(%error, "exercise check failed"),
                }
                persist_state(&monitor, &state);
                exercise_sleep.as_mut().reset(next_deadline(exercise_at));
            }
            _ = &mut digest_sleep => {
                flush_digest(&monitor, &mut state);
                persist_state(&monitor, &state);
                digest_sleep.as_mut().reset(next_deadline(digest_at));
            }
        }
    }

    Ok(())
}

fn persist_state(monitor: &Monitor, state: &MonitorState) {
    if let Err(error) = monitor.save_state(state) {
        error!(%error, "failed to save monitor state");
    }
}

/// Write and publish the alerts gathered since the last digest. A failure
/// keeps the alerts pending so the next digest still includes them.
fn flush_digest(monitor: &Monitor, state: &mut MonitorState) {
    let date = monitor.digest_date(Utc::now());
    if state.pending_digest.is_empty() {
        info!(%date, "no alerts today, skipping digest");
        return;
    }

    let summary = Digest::new(date, state.pending_digest.clone()).render_markdown();
    match finish(monitor.repo_root(), monitor.config(), date, &summary, true) {
        Ok(report) => {
            info!(%date, path = ?report.persisted, published = ?report.published, "daily digest done");
            state.pending_digest.clear();
        }
        Err(error) => warn!(%date, %error, "daily digest failed, keeping alerts for next run"),
    }
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for ctrl-c");
        // Without a signal handler the process can only be stopped externally.
        std::future::pending::<()>().await;
    }
}
