//! Bot configuration.
//!
//! Configuration is read from a JSON file (`config.json` in the working
//! directory by default) and may then be overridden from the command line or
//! environment. The flat `{"DISCORD_TOKEN": .., "DISCORD_CHANNEL_ID": ..}`
//! layout written by earlier releases is still accepted.

use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use fire_alerts::{DEFAULT_HAZARD_TYPES, HazardFilter, PollerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};

/// Default location of the NWS active-alerts endpoint.
pub const DEFAULT_FEED_URL: &str = "https://api.weather.gov/alerts/active";

/// User-Agent sent to the feed, which requires one that identifies the caller.
pub const DEFAULT_USER_AGENT: &str = "FireWeatherBot/1.0 (Discord Notification Bot)";

/// Default Discord REST API base.
pub const DEFAULT_DISCORD_API: &str = "https://discord.com/api/v10";

/// Discord credentials and destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscordConfig {
    /// Bot token.
    #[serde(default)]
    pub token: String,
    /// Channel that receives alerts.
    #[serde(default)]
    pub channel_id: String,
    /// Application id; looked up from the token when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Application public key (hex) used to verify interaction requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// REST API base URL.
    #[serde(default = "default_discord_api")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: String::new(),
            application_id: None,
            public_key: None,
            api_base: default_discord_api(),
        }
    }
}

/// Alert feed settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    /// Active-alerts endpoint.
    pub url: String,
    /// User-Agent header value.
    pub user_agent: String,
    /// Event types to relay.
    pub hazard_types: Vec<String>,
    /// Ask the feed to filter by event type as well.
    pub server_side_filter: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            hazard_types: DEFAULT_HAZARD_TYPES.iter().map(ToString::to_string).collect(),
            server_side_filter: false,
            timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    /// Returns the hazard filter for the configured event types.
    #[must_use]
    pub fn filter(&self) -> HazardFilter {
        HazardFilter::new(self.hazard_types.iter().cloned())
    }
}

/// Polling and deduplication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between scheduled polls.
    pub interval_secs: u64,
    /// Milliseconds between deliveries within one poll.
    pub delivery_spacing_ms: u64,
    /// Tracker size that triggers eviction.
    pub high_water_mark: usize,
    /// Identifiers kept after eviction.
    pub retain_count: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            delivery_spacing_ms: 1000,
            high_water_mark: fire_alerts::DEFAULT_HIGH_WATER_MARK,
            retain_count: fire_alerts::DEFAULT_RETAIN_COUNT,
        }
    }
}

impl PollConfig {
    /// Returns the scheduled poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Returns the poller configuration.
    #[must_use]
    pub const fn poller(&self) -> PollerConfig {
        PollerConfig {
            delivery_spacing: Duration::from_millis(self.delivery_spacing_ms),
            high_water_mark: self.high_water_mark,
            retain_count: self.retain_count,
        }
    }
}

/// Interactions endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InteractionsConfig {
    /// Whether to serve the interactions endpoint.
    pub enabled: bool,
    /// Listen address.
    pub listen_addr: String,
}

impl Default for InteractionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Main bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotConfig {
    /// Discord settings.
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Feed settings.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Polling settings.
    #[serde(default)]
    pub poll: PollConfig,
    /// Interactions endpoint settings.
    #[serde(default)]
    pub interactions: InteractionsConfig,
}

/// The flat layout used by the first releases.
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    #[serde(rename = "DISCORD_TOKEN")]
    token: String,
    #[serde(rename = "DISCORD_CHANNEL_ID")]
    channel_id: String,
}

/// Values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Bot token.
    pub token: Option<String>,
    /// Alert channel.
    pub channel_id: Option<String>,
    /// Application id.
    pub application_id: Option<String>,
    /// Application public key.
    pub public_key: Option<String>,
    /// Interactions listen address.
    pub listen_addr: Option<String>,
    /// Poll interval in seconds.
    pub interval_secs: Option<u64>,
}

impl BotConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> BotResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BotError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_json(&content)
    }

    /// Loads the file if it exists, otherwise starts from defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> BotResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parses configuration from a JSON string.
    ///
    /// Does not validate; call [`BotConfig::validate`] once overrides are
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(content: &str) -> BotResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| BotError::Config(format!("invalid JSON: {e}")))?;

        if value.get("DISCORD_TOKEN").is_some() {
            let legacy: LegacyConfig = serde_json::from_value(value)
                .map_err(|e| BotError::Config(format!("invalid config: {e}")))?;
            return Ok(Self {
                discord: DiscordConfig {
                    token: legacy.token,
                    channel_id: legacy.channel_id,
                    ..DiscordConfig::default()
                },
                ..Self::default()
            });
        }

        serde_json::from_value(value).map_err(|e| BotError::Config(format!("invalid config: {e}")))
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> BotResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Applies command-line and environment overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(token) = overrides.token {
            self.discord.token = token;
        }
        if let Some(channel_id) = overrides.channel_id {
            self.discord.channel_id = channel_id;
        }
        if overrides.application_id.is_some() {
            self.discord.application_id = overrides.application_id;
        }
        if overrides.public_key.is_some() {
            self.discord.public_key = overrides.public_key;
        }
        if let Some(addr) = overrides.listen_addr {
            self.interactions.listen_addr = addr;
        }
        if let Some(secs) = overrides.interval_secs {
            self.poll.interval_secs = secs;
        }
    }

    /// Returns the parsed interactions listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed.
    pub fn listen_addr(&self) -> BotResult<SocketAddr> {
        self.interactions.listen_addr.parse().map_err(|e| {
            BotError::Config(format!(
                "interactions.listen_addr '{}' is invalid: {e}",
                self.interactions.listen_addr
            ))
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> BotResult<()> {
        if self.discord.token.trim().is_empty() {
            return Err(BotError::Config(
                "discord token is not set (DISCORD_TOKEN)".to_string(),
            ));
        }

        if self.discord.channel_id.trim().is_empty() {
            return Err(BotError::Config(
                "discord channel id is not set (DISCORD_CHANNEL_ID)".to_string(),
            ));
        }

        if !is_snowflake(&self.discord.channel_id) {
            return Err(BotError::Config(format!(
                "discord channel id '{}' must be numeric",
                self.discord.channel_id
            )));
        }

        if let Some(app_id) = &self.discord.application_id {
            if !is_snowflake(app_id) {
                return Err(BotError::Config(format!(
                    "discord application id '{app_id}' must be numeric"
                )));
            }
        }

        if let Some(key) = &self.discord.public_key {
            if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(BotError::Config(
                    "discord public key must be 64 hex characters".to_string(),
                ));
            }
        }

        if !self.feed.url.starts_with("http://") && !self.feed.url.starts_with("https://") {
            return Err(BotError::Config(
                "feed.url must start with http:// or https://".to_string(),
            ));
        }

        if self.feed.hazard_types.is_empty() {
            return Err(BotError::Config(
                "feed.hazard_types cannot be empty".to_string(),
            ));
        }

        if self.poll.interval_secs == 0 {
            return Err(BotError::Config(
                "poll.interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.poll.high_water_mark == 0 {
            return Err(BotError::Config(
                "poll.high_water_mark must be greater than 0".to_string(),
            ));
        }

        if self.poll.retain_count > self.poll.high_water_mark {
            return Err(BotError::Config(
                "poll.retain_count cannot exceed poll.high_water_mark".to_string(),
            ));
        }

        if self.interactions.enabled {
            self.listen_addr()?;
        }

        Ok(())
    }

    /// Returns a sample configuration for `init-config`.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            discord: DiscordConfig {
                token: "YOUR_BOT_TOKEN".to_string(),
                channel_id: "000000000000000000".to_string(),
                ..DiscordConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Asks for the token and channel id on a first run.
///
/// # Errors
///
/// Returns an error if reading or writing the terminal fails, or if either
/// answer is empty.
pub fn prompt_setup<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> BotResult<BotConfig> {
    writeln!(output)?;
    writeln!(output, "========================================")?;
    writeln!(output, "  Fire Weather Alert Bot - First Run")?;
    writeln!(output, "========================================")?;
    writeln!(output)?;
    writeln!(output, "You need a Discord Bot Token.")?;
    writeln!(output, "Get one at: https://discord.com/developers/applications")?;
    writeln!(output, "(Create app > Bot > Reset Token > Copy)")?;
    let token = ask(input, output, "Paste your Discord Bot Token: ")?;

    writeln!(output)?;
    writeln!(output, "You need a Discord Channel ID.")?;
    writeln!(
        output,
        "(Enable Developer Mode in Discord, right-click channel > Copy ID)"
    )?;
    let channel_id = ask(input, output, "Paste your Channel ID: ")?;

    if token.is_empty() || channel_id.is_empty() {
        return Err(BotError::Config(
            "token and channel id are both required".to_string(),
        ));
    }

    Ok(BotConfig {
        discord: DiscordConfig {
            token,
            channel_id,
            ..DiscordConfig::default()
        },
        ..BotConfig::default()
    })
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> BotResult<String> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn is_snowflake(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

fn default_discord_api() -> String {
    DEFAULT_DISCORD_API.to_string()
}
