//! Chat platform capability interface.
//!
//! The scheduler and compliance logic never talk to Discord directly; they
//! consume this trait. `discord` provides the REST-backed implementation,
//! `mock` a scriptable in-memory one for tests.

use async_trait::async_trait;
use thiserror::Error;

pub mod discord;
pub mod mock;

pub use discord::DiscordClient;
pub use mock::MockPlatform;

/// Snowflake identifiers. The platform treats them as opaque.
pub type ChannelId = u64;
pub type GroupId = u64;
pub type UserId = u64;
pub type MessageId = u64;

/// A message fetched back from the platform, carrying just enough to
/// enumerate acknowledgers later.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    /// Emoji names of the reactions currently on the message, in the order
    /// the platform reports them.
    pub reaction_emojis: Vec<String>,
}

/// Errors from chat platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Channel {channel_id} unavailable")]
    ChannelUnavailable { channel_id: ChannelId },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Response format error: {message}")]
    FormatError { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Capability set consumed by the notification engine.
#[async_trait]
pub trait ChatPlatform {
    /// Post `text` to a channel, returning the new message's id.
    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError>;

    /// Fetch a previously posted message. `Ok(None)` means the message (or
    /// its channel) no longer exists.
    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<FetchedMessage>, PlatformError>;

    /// Users who acknowledged the message, automated accounts excluded.
    /// Only the message's first reaction counts as the acknowledgement
    /// signal; an unreacted message yields an empty list.
    async fn list_acknowledgers(
        &self,
        message: &FetchedMessage,
    ) -> Result<Vec<UserId>, PlatformError>;

    /// Current members of the group, in the order the platform reports them.
    async fn group_members(&self, group_id: GroupId) -> Result<Vec<UserId>, PlatformError>;

    /// Inline mention of a user.
    fn format_user_mention(&self, user_id: UserId) -> String {
        format!("<@{}>", user_id)
    }

    /// Inline mention of a group.
    fn format_group_mention(&self, group_id: GroupId) -> String {
        format!("<@&{}>", group_id)
    }

    /// Name of this platform for logging/debugging.
    fn platform_name(&self) -> &str;
}
