//! Delayed compliance check.
//!
//! One workflow runs per fired rule: sleep out the grace period, then diff
//! the group's current membership against the users who acknowledged the
//! notice and post a reminder naming the rest. The workflow checks the
//! message id it captured at launch — if the tracker entry has since been
//! overwritten by a newer notice, that newer notice has its own workflow.
//!
//! Every failure here is terminal for this workflow only: it is logged and
//! the check is abandoned. Nothing propagates to the tick driver or to
//! sibling workflows.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time;

use crate::platform::{ChatPlatform, MessageId, UserId};
use crate::rules::NotificationRule;
use crate::tracker::PendingPostTracker;

/// Grace-period workflow entry point, spawned by the scheduler for each
/// fired rule. Sleeps, checks, then releases the tracker entry it owns.
pub async fn run_compliance_check(
    platform: Arc<dyn ChatPlatform + Send + Sync>,
    rule: NotificationRule,
    message_id: MessageId,
    grace_period: Duration,
    tracker: Arc<RwLock<PendingPostTracker>>,
) {
    time::sleep(grace_period).await;

    check_once(&platform, &rule, message_id).await;

    // Last-write-wins: only drops the entry if this workflow's post is
    // still the one on record.
    tracker
        .write()
        .await
        .clear_completed(rule.channel_id, message_id);
}

/// Execute a single compliance check. Extracted for testability.
pub async fn check_once(
    platform: &Arc<dyn ChatPlatform + Send + Sync>,
    rule: &NotificationRule,
    message_id: MessageId,
) {
    // 1. The notice itself must still exist.
    let message = match platform.fetch_message(rule.channel_id, message_id).await {
        Ok(Some(message)) => message,
        Ok(None) => {
            tracing::warn!(
                "Notice {} in channel {} no longer exists — skipping compliance check",
                message_id,
                rule.channel_id,
            );
            return;
        }
        Err(err) => {
            tracing::error!(
                "Failed to fetch notice {} in channel {}: {}",
                message_id,
                rule.channel_id,
                err,
            );
            return;
        }
    };

    // 2. Current group membership, in lookup order.
    let members = match platform.group_members(rule.group_id).await {
        Ok(members) => members,
        Err(err) => {
            tracing::error!("Failed to look up group {}: {}", rule.group_id, err);
            return;
        }
    };

    // 3. Who acknowledged (automated accounts already excluded).
    let acknowledgers: HashSet<UserId> = match platform.list_acknowledgers(&message).await {
        Ok(users) => users.into_iter().collect(),
        Err(err) => {
            tracing::error!(
                "Failed to list acknowledgers of notice {}: {}",
                message_id,
                err,
            );
            return;
        }
    };

    // Membership order is preserved for the reminder text.
    let non_responders: Vec<UserId> = members
        .into_iter()
        .filter(|member| !acknowledgers.contains(member))
        .collect();

    if non_responders.is_empty() {
        tracing::info!(
            "All group members acknowledged notice {} in channel {}",
            message_id,
            rule.channel_id,
        );
        return;
    }

    tracing::info!(
        "{} member(s) have not acknowledged notice {} in channel {}",
        non_responders.len(),
        message_id,
        rule.channel_id,
    );

    let reminder = compose_reminder(platform.as_ref(), &non_responders);
    if let Err(err) = platform.send_message(rule.channel_id, &reminder).await {
        tracing::error!(
            "Failed to send reminder to channel {}: {}",
            rule.channel_id,
            err,
        );
    }
}

/// Reminder body naming every non-responder, in membership-lookup order.
pub fn compose_reminder(platform: &dyn ChatPlatform, non_responders: &[UserId]) -> String {
    let mentions = non_responders
        .iter()
        .map(|user| platform.format_user_mention(*user))
        .collect::<Vec<_>>()
        .join(" ");
    format!("Not yet reacted: {mentions}\nPlease read the minutes and react!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;
    use crate::rules::{NoticeTemplate, NotificationRule, RuleSpec};

    const CHANNEL: u64 = 10;
    const GROUP: u64 = 20;

    fn make_rule() -> NotificationRule {
        NotificationRule::new(RuleSpec {
            channel_id: CHANNEL,
            group_id: GROUP,
            weekday: 3,
            time: "12:40".to_string(),
            template: NoticeTemplate::MeetingMinutes {
                meeting_type: "weekly seminar".to_string(),
                minutes_url: "https://example.com/minutes/001".to_string(),
            },
        })
        .unwrap()
    }

    async fn post_notice(platform: &MockPlatform) -> MessageId {
        platform.send_message(CHANNEL, "notice").await.unwrap()
    }

    #[tokio::test]
    async fn reminder_names_non_responders_in_membership_order() {
        let platform = Arc::new(MockPlatform::new().with_group(GROUP, vec![1, 2, 3]));
        let message_id = post_notice(&platform).await;
        platform.ack(message_id, 1);

        let dyn_platform: Arc<dyn ChatPlatform + Send + Sync> = platform.clone();
        check_once(&dyn_platform, &make_rule(), message_id).await;

        let sent = platform.sent_to(CHANNEL);
        assert_eq!(sent.len(), 2, "notice plus one reminder");
        assert_eq!(
            sent[1].text,
            "Not yet reacted: <@2> <@3>\nPlease read the minutes and react!"
        );
    }

    #[tokio::test]
    async fn no_reminder_when_everyone_acknowledged() {
        let platform = Arc::new(MockPlatform::new().with_group(GROUP, vec![1, 2]));
        let message_id = post_notice(&platform).await;
        platform.ack(message_id, 1);
        platform.ack(message_id, 2);

        let dyn_platform: Arc<dyn ChatPlatform + Send + Sync> = platform.clone();
        check_once(&dyn_platform, &make_rule(), message_id).await;

        // Only the original notice was ever sent.
        assert_eq!(platform.sent_to(CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn bot_acknowledgements_do_not_count() {
        let platform = Arc::new(MockPlatform::new().with_group(GROUP, vec![1]));
        let message_id = post_notice(&platform).await;
        platform.ack_from_bot(message_id, 1);

        let dyn_platform: Arc<dyn ChatPlatform + Send + Sync> = platform.clone();
        check_once(&dyn_platform, &make_rule(), message_id).await;

        let sent = platform.sent_to(CHANNEL);
        assert_eq!(sent.len(), 2);
        assert!(sent[1].text.contains("<@1>"));
    }

    #[tokio::test]
    async fn deleted_notice_abandons_the_check_silently() {
        let platform = Arc::new(MockPlatform::new().with_group(GROUP, vec![1, 2]));
        let message_id = post_notice(&platform).await;
        platform.delete_message(message_id);

        let dyn_platform: Arc<dyn ChatPlatform + Send + Sync> = platform.clone();
        check_once(&dyn_platform, &make_rule(), message_id).await;

        assert_eq!(platform.sent_to(CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn group_lookup_failure_abandons_the_check() {
        let platform = Arc::new(
            MockPlatform::new()
                .with_group(GROUP, vec![1])
                .with_failing_group_lookup(GROUP),
        );
        let message_id = post_notice(&platform).await;

        let dyn_platform: Arc<dyn ChatPlatform + Send + Sync> = platform.clone();
        check_once(&dyn_platform, &make_rule(), message_id).await;

        assert_eq!(platform.sent_to(CHANNEL).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn workflow_clears_its_own_tracker_entry_after_the_check() {
        let platform = Arc::new(MockPlatform::new().with_group(GROUP, vec![1]));
        let message_id = post_notice(&platform).await;
        platform.ack(message_id, 1);

        let tracker = Arc::new(RwLock::new(PendingPostTracker::new()));
        tracker
            .write()
            .await
            .record(CHANNEL, message_id, chrono::Utc::now());

        let dyn_platform: Arc<dyn ChatPlatform + Send + Sync> = platform.clone();
        let handle = tokio::spawn(run_compliance_check(
            dyn_platform,
            make_rule(),
            message_id,
            Duration::from_secs(60),
            tracker.clone(),
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        handle.await.unwrap();

        assert!(tracker.read().await.is_empty());
    }
}
