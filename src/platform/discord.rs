//! Discord REST adapter.
//!
//! Minimal client for the handful of endpoints the notification engine
//! needs: posting to a channel, fetching a message back, listing the users
//! behind a reaction and enumerating guild members with a given role.
//! Acknowledgement is read from the message's first reaction, whichever
//! emoji that happens to be.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{
    ChannelId, ChatPlatform, FetchedMessage, GroupId, MessageId, PlatformError, UserId,
};

#[derive(Clone)]
pub struct DiscordClient {
    base_url: String,
    token: String,
    guild_id: u64,
    http: Client,
}

impl DiscordClient {
    pub fn new(base_url: String, token: String, guild_id: u64) -> Self {
        Self {
            base_url,
            token,
            guild_id,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    reactions: Vec<DiscordReaction>,
}

#[derive(Debug, Deserialize)]
struct DiscordReaction {
    emoji: DiscordEmoji,
}

#[derive(Debug, Deserialize)]
struct DiscordEmoji {
    name: Option<String>,
    id: Option<String>,
}

impl DiscordEmoji {
    /// Path form of the emoji for the reactions endpoint: `name:id` for
    /// custom emoji, the bare (unicode) name otherwise.
    fn as_path_segment(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        Some(match &self.id {
            Some(id) => format!("{}:{}", name, id),
            None => name.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct DiscordMember {
    user: DiscordUser,
    #[serde(default)]
    roles: Vec<String>,
}

fn parse_snowflake(raw: &str) -> Result<u64, PlatformError> {
    raw.parse::<u64>().map_err(|_| PlatformError::FormatError {
        message: format!("Invalid snowflake id: {raw:?}"),
    })
}

fn network_error(err: reqwest::Error) -> PlatformError {
    PlatformError::NetworkError {
        message: err.to_string(),
    }
}

fn parse_error(err: reqwest::Error) -> PlatformError {
    PlatformError::FormatError {
        message: err.to_string(),
    }
}

/// Map a non-success status shared by all endpoints.
fn status_error(status: StatusCode) -> PlatformError {
    match status {
        StatusCode::UNAUTHORIZED => PlatformError::AuthError {
            message: "Discord rejected the bot token".to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimitExceeded,
        other => PlatformError::NetworkError {
            message: format!("Discord returned HTTP {}", other),
        },
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);

        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&json!({ "content": text }))
            .send()
            .await
            .map_err(network_error)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                return Err(PlatformError::ChannelUnavailable { channel_id });
            }
            status => return Err(status_error(status)),
        }

        let message = response
            .json::<DiscordMessage>()
            .await
            .map_err(parse_error)?;

        parse_snowflake(&message.id)
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<FetchedMessage>, PlatformError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.base_url, channel_id, message_id
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(network_error)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => return Ok(None),
            status => return Err(status_error(status)),
        }

        let message = response
            .json::<DiscordMessage>()
            .await
            .map_err(parse_error)?;

        let reaction_emojis = message
            .reactions
            .iter()
            .filter_map(|r| r.emoji.as_path_segment())
            .collect();

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
        // Acknowledgement signal is the first reaction on the message.
        let Some(emoji) = message.reaction_emojis.first() else {
            return Ok(Vec::new());
        };

        let url = format!(
            "{}/channels/{}/messages/{}/reactions/{}?limit=100",
            self.base_url, message.channel_id, message.message_id, emoji
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let users = response
            .json::<Vec<DiscordUser>>()
            .await
            .map_err(parse_error)?;

        users
            .into_iter()
            .filter(|user| !user.bot)
            .map(|user| parse_snowflake(&user.id))
            .collect()
    }

    async fn group_members(&self, group_id: GroupId) -> Result<Vec<UserId>, PlatformError> {
        let url = format!(
            "{}/guilds/{}/members?limit=1000",
            self.base_url, self.guild_id
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let members = response
            .json::<Vec<DiscordMember>>()
            .await
            .map_err(parse_error)?;

        let role = group_id.to_string();
        members
            .into_iter()
            .filter(|member| member.roles.iter().any(|r| r == &role))
            .map(|member| parse_snowflake(&member.user.id))
            .collect()
    }

    fn platform_name(&self) -> &str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test-token";
    const GUILD: u64 = 900;

    async fn make_client(server: &MockServer) -> DiscordClient {
        DiscordClient::new(server.uri(), TOKEN.to_string(), GUILD)
    }

    #[tokio::test]
    async fn send_message_posts_content_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/10/messages"))
            .and(header("Authorization", "Bot test-token"))
            .and(body_json(serde_json::json!({ "content": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "123456",
            })))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let message_id = client.send_message(10, "hello").await.unwrap();
        assert_eq!(message_id, 123456);
    }

    #[tokio::test]
    async fn send_message_to_forbidden_channel_is_channel_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/10/messages"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let err = client.send_message(10, "hello").await.unwrap_err();
        assert!(matches!(
            err,
            PlatformError::ChannelUnavailable { channel_id: 10 }
        ));
    }

    #[tokio::test]
    async fn fetch_message_returns_none_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/10/messages/123"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        assert!(client.fetch_message(10, 123).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_message_collects_reaction_emojis() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/10/messages/123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "123",
                "reactions": [
                    { "emoji": { "name": "thumbsup", "id": "777" } },
                    { "emoji": { "name": "✅", "id": null } },
                ],
            })))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let message = client.fetch_message(10, 123).await.unwrap().unwrap();
        assert_eq!(message.reaction_emojis, vec!["thumbsup:777", "✅"]);
    }

    #[tokio::test]
    async fn list_acknowledgers_filters_bots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/10/messages/123/reactions/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "1", "bot": false },
                { "id": "2", "bot": true },
                { "id": "3" },
            ])))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let message = FetchedMessage {
            channel_id: 10,
            message_id: 123,
            reaction_emojis: vec!["ok".to_string()],
        };
        let users = client.list_acknowledgers(&message).await.unwrap();
        assert_eq!(users, vec![1, 3]);
    }

    #[tokio::test]
    async fn list_acknowledgers_of_unreacted_message_is_empty() {
        let server = MockServer::start().await;
        let client = make_client(&server).await;
        let message = FetchedMessage {
            channel_id: 10,
            message_id: 123,
            reaction_emojis: Vec::new(),
        };
        assert!(client.list_acknowledgers(&message).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn group_members_filters_by_role() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/900/members"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "user": { "id": "1" }, "roles": ["20", "30"] },
                { "user": { "id": "2" }, "roles": ["30"] },
                { "user": { "id": "3" }, "roles": ["20"] },
            ])))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let members = client.group_members(20).await.unwrap();
        assert_eq!(members, vec![1, 3]);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/900/members"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = make_client(&server).await;
        let err = client.group_members(20).await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthError { .. }));
    }
}
