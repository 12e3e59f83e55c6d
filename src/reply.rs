//! Reactive acknowledgement replies.
//!
//! When a group member reacts to a currently tracked notice, reply with a
//! random message from a configured pool. The platform event source calls
//! [`ReactionReplier::handle_reaction`] for each incoming reaction; anything
//! that is not a group member reacting to a tracked notice is ignored.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use crate::platform::{ChannelId, ChatPlatform, MessageId, UserId};
use crate::rules::{NotificationRule, RuleSet};
use crate::tracker::PendingPostTracker;

/// A reaction observed on the platform.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: UserId,
    /// True when the reacting account is automated.
    pub from_bot: bool,
}

/// Replies to acknowledgements with a message drawn from a fixed pool.
pub struct ReactionReplier {
    messages: Vec<String>,
}

impl ReactionReplier {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// Handle one reaction event. Ignores bot reactions, reactions on
    /// messages that are not tracked notices, and reactions from users
    /// outside the rule's group. Send failures are logged, never raised.
    pub async fn handle_reaction(
        &self,
        platform: &Arc<dyn ChatPlatform + Send + Sync>,
        rules: &RuleSet,
        tracker: &Arc<RwLock<PendingPostTracker>>,
        event: &ReactionEvent,
    ) {
        if event.from_bot || self.messages.is_empty() {
            return;
        }

        let Some(rule) = self.find_rule_for_message(rules, tracker, event).await else {
            return;
        };

        let members = match platform.group_members(rule.group_id).await {
            Ok(members) => members,
            Err(err) => {
                tracing::error!("Failed to look up group {}: {}", rule.group_id, err);
                return;
            }
        };
        if !members.contains(&event.user_id) {
            return;
        }

        let pool_message = {
            let mut rng = rand::thread_rng();
            match self.messages.choose(&mut rng) {
                Some(message) => message.clone(),
                None => return,
            }
        };

        let text = format!(
            "{} {}",
            platform.format_user_mention(event.user_id),
            pool_message,
        );
        if let Err(err) = platform.send_message(event.channel_id, &text).await {
            tracing::error!(
                "Failed to send acknowledgement reply to channel {}: {}",
                event.channel_id,
                err,
            );
        }
    }

    /// The rule whose tracked notice is the reacted message, if any.
    async fn find_rule_for_message(
        &self,
        rules: &RuleSet,
        tracker: &Arc<RwLock<PendingPostTracker>>,
        event: &ReactionEvent,
    ) -> Option<NotificationRule> {
        let tracker = tracker.read().await;
        rules
            .rules()
            .iter()
            .find(|rule| {
                tracker
                    .get(rule.channel_id)
                    .is_some_and(|post| post.message_id == event.message_id)
            })
            .cloned()
    }
}
