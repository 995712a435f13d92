//! Discord REST client and the alert notifier built on it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fire_alerts::{AlertError, AlertRecord, Notifier};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::DiscordConfig;
use crate::discord::embed::{MessagePayload, alert_embed};
use crate::error::{BotError, BotResult};

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The bot's application, as reported by Discord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// Application id.
    pub id: String,
    /// Application name.
    #[serde(default)]
    pub name: String,
}

/// A channel, as reported by Discord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel id.
    pub id: String,
    /// Channel name, absent for DMs.
    #[serde(default)]
    pub name: Option<String>,
}

/// A global slash command definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Command name, as typed after the slash.
    pub name: String,
    /// Help text shown in the client.
    pub description: String,
    /// Command type; 1 is a chat input command.
    #[serde(rename = "type")]
    pub kind: u8,
}

impl CommandDefinition {
    /// Creates a chat input command.
    #[must_use]
    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: 1,
        }
    }
}

/// Minimal Discord REST API client.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    /// Creates a client from the Discord configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &DiscordConfig) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "DiscordBot (https://github.com/firewatch/firewatch, {CLIENT_VERSION})"
            ))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> BotResult<Value> {
        let url = format!("{}{path}", self.api_base);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%method, path = %path, status = status.as_u16(), "discord request");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Discord {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Posts a message to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Discord rejects it.
    pub async fn send_message(&self, channel_id: &str, message: &MessagePayload) -> BotResult<()> {
        let body = serde_json::to_value(message)?;
        self.request(
            Method::POST,
            &format!("/channels/{channel_id}/messages"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// Looks up a channel, confirming the bot can see it.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel does not exist or is not visible.
    pub async fn get_channel(&self, channel_id: &str) -> BotResult<ChannelInfo> {
        let value = self
            .request(Method::GET, &format!("/channels/{channel_id}"), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the application that owns the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn current_application(&self) -> BotResult<ApplicationInfo> {
        let value = self
            .request(Method::GET, "/oauth2/applications/@me", None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Replaces the application's global slash commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn register_commands(
        &self,
        application_id: &str,
        commands: &[CommandDefinition],
    ) -> BotResult<()> {
        let body = serde_json::to_value(commands)?;
        self.request(
            Method::PUT,
            &format!("/applications/{application_id}/commands"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// Replaces the original reply to a deferred interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn edit_original_response(
        &self,
        application_id: &str,
        interaction_token: &str,
        message: &MessagePayload,
    ) -> BotResult<()> {
        let body = serde_json::to_value(message)?;
        self.request(
            Method::PATCH,
            &format!("/webhooks/{application_id}/{interaction_token}/messages/@original"),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

/// Delivers alerts as embeds to one Discord channel.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Arc<DiscordClient>,
    channel_id: String,
    name: String,
}

impl DiscordNotifier {
    /// Creates a notifier for the given channel.
    #[must_use]
    pub fn new(client: Arc<DiscordClient>, channel_id: impl Into<String>) -> Self {
        let channel_id = channel_id.into();
        Self {
            client,
            name: format!("discord:{channel_id}"),
            channel_id,
        }
    }

    /// Returns the destination channel id.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver<'a>(
        &'a self,
        alert: &'a AlertRecord,
    ) -> Pin<Box<dyn Future<Output = fire_alerts::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let message = MessagePayload::embed(alert_embed(alert, false, Utc::now()));
            self.client
                .send_message(&self.channel_id, &message)
                .await
                .map_err(AlertError::delivery)
        })
    }
}
