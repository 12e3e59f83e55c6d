//! Scriptable in-memory chat platform used by unit and integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ChannelId, ChatPlatform, FetchedMessage, GroupId, MessageId, PlatformError, UserId,
};

/// A message captured by [`MockPlatform::send_message`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Debug, Default)]
struct Inner {
    members: HashMap<GroupId, Vec<UserId>>,
    /// message → (user, is_bot) reactions, in arrival order.
    acks: HashMap<MessageId, Vec<(UserId, bool)>>,
    deleted: HashSet<MessageId>,
    unavailable_channels: HashSet<ChannelId>,
    failing_groups: HashSet<GroupId>,
    sent: Vec<SentMessage>,
}

/// In-memory [`ChatPlatform`] with builder-style scripting.
#[derive(Debug, Default)]
pub struct MockPlatform {
    inner: Mutex<Inner>,
    next_message_id: AtomicU64,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            inner: Mutex::default(),
            next_message_id: AtomicU64::new(1000),
        }
    }

    /// Script the membership of a group.
    pub fn with_group(self, group_id: GroupId, members: Vec<UserId>) -> Self {
        self.inner.lock().unwrap().members.insert(group_id, members);
        self
    }

    /// Make `send_message` to this channel fail with `ChannelUnavailable`.
    pub fn with_unavailable_channel(self, channel_id: ChannelId) -> Self {
        self.inner
            .lock()
            .unwrap()
            .unavailable_channels
            .insert(channel_id);
        self
    }

    /// Make `group_members` for this group fail with a network error.
    pub fn with_failing_group_lookup(self, group_id: GroupId) -> Self {
        self.inner.lock().unwrap().failing_groups.insert(group_id);
        self
    }

    /// Register a human acknowledgement on a message.
    pub fn ack(&self, message_id: MessageId, user_id: UserId) {
        self.inner
            .lock()
            .unwrap()
            .acks
            .entry(message_id)
            .or_default()
            .push((user_id, false));
    }

    /// Register an acknowledgement from an automated account.
    pub fn ack_from_bot(&self, message_id: MessageId, user_id: UserId) {
        self.inner
            .lock()
            .unwrap()
            .acks
            .entry(message_id)
            .or_default()
            .push((user_id, true));
    }

    /// Make a previously sent message unfetchable.
    pub fn delete_message(&self, message_id: MessageId) {
        self.inner.lock().unwrap().deleted.insert(message_id);
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Messages sent to one channel, in send order.
    pub fn sent_to(&self, channel_id: ChannelId) -> Vec<SentMessage> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.unavailable_channels.contains(&channel_id) {
            return Err(PlatformError::ChannelUnavailable { channel_id });
        }
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        inner.sent.push(SentMessage {
            channel_id,
            message_id,
            text: text.to_string(),
        });
        Ok(message_id)
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<FetchedMessage>, PlatformError> {
        let inner = self.inner.lock().unwrap();
        if inner.deleted.contains(&message_id) {
            return Ok(None);
        }
        let reaction_emojis = if inner.acks.get(&message_id).is_some_and(|a| !a.is_empty()) {
            vec!["\u{2705}".to_string()]
        } else {
            Vec::new()
        };
        Ok(Some(FetchedMessage {
            channel_id,
            message_id,
            reaction_emojis,
        }))
    }

    async fn list_acknowledgers(
        &self,
        message: &FetchedMessage,
    ) -> Result<Vec<UserId>, PlatformError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .acks
            .get(&message.message_id)
            .map(|acks| {
                acks.iter()
                    .filter(|(_, is_bot)| !is_bot)
                    .map(|(user, _)| *user)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn group_members(&self, group_id: GroupId) -> Result<Vec<UserId>, PlatformError> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_groups.contains(&group_id) {
            return Err(PlatformError::NetworkError {
                message: format!("group {} lookup failed", group_id),
            });
        }
        Ok(inner.members.get(&group_id).cloned().unwrap_or_default())
    }

    fn platform_name(&self) -> &str {
        "mock"
    }
}
