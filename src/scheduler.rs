//! Weekly notice scheduler.
//!
//! Drives the main minute-tick loop: each tick evaluates every rule against
//! the local clock and, for each rule that fires, publishes its notice,
//! records it in the pending-post tracker and spawns a detached compliance
//! workflow. Ticks never wait on workflows — a tick finishes its rule scan
//! before the next begins, while any number of grace-period sleeps run
//! concurrently.
//!
//! A tick that the clock skips entirely (process paused past the minute) is
//! simply lost; there is no catch-up. Missed interval ticks are not
//! replayed, and a late tick landing in an already-evaluated minute is
//! dropped, so one configured fire moment publishes exactly one notice.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike, Utc};
use tokio::signal;
use tokio::sync::RwLock;
use tokio::time;
use tokio::time::MissedTickBehavior;

use crate::compliance::run_compliance_check;
use crate::platform::ChatPlatform;
use crate::rules::{NotificationRule, RuleSet};
use crate::tracker::PendingPostTracker;

/// One evaluation per minute.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Run the notice scheduling loop.
///
/// On each tick:
/// 1. Evaluate every rule in `rules` (configuration order) against now
/// 2. Publish the notice for each rule that fires
/// 3. Record the post in `tracker` and spawn its compliance workflow
///
/// Errors from publishing one rule's notice are logged and the scan
/// continues — a single unreachable channel never takes down the loop.
///
/// Runs until `Ctrl+C` (SIGINT) is received. In-flight grace-period
/// workflows are discarded on shutdown; pending state is in-memory only.
pub async fn run_notice_scheduler(
    platform: Arc<dyn ChatPlatform + Send + Sync>,
    rules: Arc<RuleSet>,
    tracker: Arc<RwLock<PendingPostTracker>>,
    grace_period: Duration,
) {
    let mut interval = time::interval(TICK_INTERVAL);
    // No catch-up: a delayed driver skips the minutes it slept through
    // instead of replaying them back-to-back.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_evaluated: Option<NaiveDateTime> = None;

    tracing::info!(
        "Notice scheduler started ({} rule(s), grace period: {}s)",
        rules.len(),
        grace_period.as_secs(),
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Local::now().naive_local();
                run_tick(&platform, &rules, &tracker, &mut last_evaluated, now, grace_period).await;
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping scheduler.");
                break;
            }
        }
    }

    tracing::info!("Notice scheduler stopped cleanly");
}

/// One driver iteration: evaluate the current minute unless an earlier
/// (replayed or late) tick already did. Extracted for testability.
pub async fn run_tick(
    platform: &Arc<dyn ChatPlatform + Send + Sync>,
    rules: &Arc<RuleSet>,
    tracker: &Arc<RwLock<PendingPostTracker>>,
    last_evaluated: &mut Option<NaiveDateTime>,
    now: NaiveDateTime,
    grace_period: Duration,
) {
    if !claim_minute(last_evaluated, now) {
        tracing::debug!(
            "Minute {} already evaluated — dropping duplicate tick",
            now.format("%H:%M"),
        );
        return;
    }
    tick_once(platform, rules, tracker, now, grace_period).await;
}

/// Mark `now`'s minute as evaluated. Returns false when that minute was
/// already claimed, so a burst of late ticks cannot re-fire a rule within
/// its one matching minute.
fn claim_minute(last_evaluated: &mut Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    let minute = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    if *last_evaluated == Some(minute) {
        return false;
    }
    *last_evaluated = Some(minute);
    true
}

/// Execute a single tick: scan all rules and fire the matching ones.
/// Extracted for testability.
pub async fn tick_once(
    platform: &Arc<dyn ChatPlatform + Send + Sync>,
    rules: &Arc<RuleSet>,
    tracker: &Arc<RwLock<PendingPostTracker>>,
    now: chrono::NaiveDateTime,
    grace_period: Duration,
) {
    for rule in rules.rules() {
        if !rule.fires_at(now) {
            continue;
        }
        fire_rule(platform, tracker, rule, grace_period).await;
    }
}

/// Publish one rule's notice and launch its compliance workflow.
async fn fire_rule(
    platform: &Arc<dyn ChatPlatform + Send + Sync>,
    tracker: &Arc<RwLock<PendingPostTracker>>,
    rule: &NotificationRule,
    grace_period: Duration,
) {
    let group_mention = platform.format_group_mention(rule.group_id);
    let body = rule.template.render(&group_mention);

    let message_id = match platform.send_message(rule.channel_id, &body).await {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(
                "Failed to publish notice to channel {} — skipping this cycle: {}",
                rule.channel_id,
                err,
            );
            return;
        }
    };

    tracing::info!(
        "Published notice {} to channel {}",
        message_id,
        rule.channel_id,
    );

    tracker
        .write()
        .await
        .record(rule.channel_id, message_id, Utc::now());

    // Fire-and-forget: the workflow owns the message id it was launched
    // with, so later overwrites of the tracker entry do not redirect it.
    tokio::spawn(run_compliance_check(
        Arc::clone(platform),
        rule.clone(),
        message_id,
        grace_period,
        Arc::clone(tracker),
    ));
}
