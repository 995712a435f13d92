//! Slash command handling.
//!
//! Each command produces a [`MessagePayload`]; the interactions server decides
//! whether it goes out as an immediate reply or as an edit of a deferred one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fire_alerts::{AlertPoller, AlertRecord, PollResult, PollTrigger, Severity, StatsSnapshot};
use tracing::info;

use crate::discord::client::CommandDefinition;
use crate::discord::embed::{
    COLOR_CLEAR, COLOR_FOUND, COLOR_INFO, Embed, MAX_EMBED_DESCRIPTION, MessagePayload,
    alert_embed, discord_time, truncate,
};

const TEST_DESCRIPTION: &str = "This is a TEST alert to verify the bot is working correctly. \
This is NOT a real alert.\n\nIf you can see this message, the bot is configured correctly and \
will send real alerts when fire weather alerts are issued.";

/// Areas listed per event type in the active-alert summary.
const AREAS_PER_TYPE: usize = 3;

/// A supported slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Post a synthetic alert.
    Test,
    /// Show statistics.
    Status,
    /// Run a poll cycle now.
    Check,
    /// Summarize the active alerts.
    Active,
}

impl Command {
    /// All commands, in registration order.
    pub const ALL: [Self; 4] = [Self::Test, Self::Status, Self::Check, Self::Active];

    /// Looks up a command by name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Returns the command name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Status => "status",
            Self::Check => "check",
            Self::Active => "active",
        }
    }

    /// Returns the help text.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Test => "Send a test alert to verify the bot is working",
            Self::Status => "Show bot status and statistics",
            Self::Check => "Manually check for new fire weather alerts",
            Self::Active => "Show count of currently active fire weather alerts",
        }
    }

    /// Returns true if the reply needs network work and must be deferred.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Check | Self::Active)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the definitions to register with Discord.
#[must_use]
pub fn definitions() -> Vec<CommandDefinition> {
    Command::ALL
        .iter()
        .map(|c| CommandDefinition::chat_input(c.name(), c.description()))
        .collect()
}

/// Executes slash commands against the shared poller.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    poller: Arc<AlertPoller>,
    poll_interval: Duration,
    hazard_types: Vec<String>,
}

impl CommandHandler {
    /// Creates a handler.
    #[must_use]
    pub const fn new(
        poller: Arc<AlertPoller>,
        poll_interval: Duration,
        hazard_types: Vec<String>,
    ) -> Self {
        Self {
            poller,
            poll_interval,
            hazard_types,
        }
    }

    /// Returns the shared poller.
    #[must_use]
    pub const fn poller(&self) -> &Arc<AlertPoller> {
        &self.poller
    }

    /// Runs a command and renders its reply.
    pub async fn execute(&self, command: Command) -> MessagePayload {
        info!(%command, "running command");
        match command {
            Command::Test => self.test(Utc::now()),
            Command::Status => self.status(),
            Command::Check => self.check().await,
            Command::Active => self.active().await,
        }
    }

    /// Renders a synthetic alert in test mode. The tracker is not touched.
    #[must_use]
    pub fn test(&self, now: DateTime<Utc>) -> MessagePayload {
        MessagePayload::embed(alert_embed(&synthetic_alert(now), true, now))
    }

    /// Renders the current statistics.
    #[must_use]
    pub fn status(&self) -> MessagePayload {
        let snapshot = self.poller.stats();
        MessagePayload::embed(status_embed(
            &snapshot,
            self.poll_interval,
            &self.hazard_types,
            Utc::now(),
        ))
    }

    /// Runs a manual poll cycle and reports its outcome.
    pub async fn check(&self) -> MessagePayload {
        let result = self.poller.poll(PollTrigger::Manual).await;
        MessagePayload::embed(check_embed(result, Utc::now()))
    }

    /// Fetches the active alerts, bypassing dedup, and summarizes them.
    pub async fn active(&self) -> MessagePayload {
        let alerts = self.poller.source().fetch().await;
        MessagePayload::embed(active_embed(&alerts, Utc::now()))
    }

    /// Renders the announcement posted when the bot comes online.
    #[must_use]
    pub fn startup(&self, now: DateTime<Utc>) -> MessagePayload {
        MessagePayload::embed(startup_embed(&self.hazard_types, self.poll_interval, now))
    }
}

/// Builds the synthetic alert used by `/test`.
#[must_use]
pub fn synthetic_alert(now: DateTime<Utc>) -> AlertRecord {
    AlertRecord::new(
        format!("TEST-{}", now.timestamp_millis()),
        "Red Flag Warning",
    )
    .with_headline("TEST ALERT - Red Flag Warning")
    .with_description(TEST_DESCRIPTION)
    .with_area("Test County, Test State")
    .with_severity(Severity::Severe)
    .with_classification("Expected", "Observed")
    .with_window(now, Some(now + chrono::Duration::hours(1)))
}

/// Formats an uptime as `Nd Nh Nm`, `Nh Nm`, `Nm Ns` or `Ns`.
#[must_use]
pub fn format_uptime(uptime: chrono::Duration) -> String {
    let seconds = uptime.num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h {}m", hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

fn interval_text(interval: Duration) -> String {
    format!("{} seconds", interval.as_secs())
}

/// Renders the `/status` embed.
#[must_use]
pub fn status_embed(
    snapshot: &StatsSnapshot,
    poll_interval: Duration,
    hazard_types: &[String],
    now: DateTime<Utc>,
) -> Embed {
    let last_check = snapshot
        .last_check
        .map_or_else(|| "Never".to_string(), |t| discord_time(t, 'R'));
    let last_alert = snapshot
        .last_alert
        .map_or_else(|| "None yet".to_string(), |t| discord_time(t, 'R'));

    Embed::new()
        .color(COLOR_INFO)
        .title("Bot Status")
        .field("Uptime", format_uptime(snapshot.uptime), true)
        .field("Alerts Sent", snapshot.alerts_sent.to_string(), true)
        .field("Tracked Alerts", snapshot.tracked.to_string(), true)
        .field("Last Check", last_check, true)
        .field("Last Alert", last_alert, true)
        .field("Poll Interval", interval_text(poll_interval), true)
        .field("Monitoring", hazard_types.join(", "), false)
        .timestamp(now)
        .footer("Fire Weather Alert Bot")
}

/// Renders the `/check` embed.
#[must_use]
pub fn check_embed(result: PollResult, now: DateTime<Utc>) -> Embed {
    let (color, description) = if result.new > 0 {
        (
            COLOR_FOUND,
            format!("Found and sent **{}** new alert(s)!", result.new),
        )
    } else {
        (COLOR_CLEAR, "No new alerts found.".to_string())
    };

    Embed::new()
        .color(color)
        .title("Manual Check Complete")
        .description(description)
        .field("Active Alerts", result.total.to_string(), true)
        .field("New Alerts", result.new.to_string(), true)
        .timestamp(now)
}

/// Summarizes alerts grouped by event type, in first-seen order.
///
/// Each group lists at most three areas followed by an "...and N more" line.
#[must_use]
pub fn active_summary(alerts: &[AlertRecord]) -> String {
    if alerts.is_empty() {
        return "No active fire weather alerts at this time.".to_string();
    }

    let mut groups: Vec<(&str, Vec<&AlertRecord>)> = Vec::new();
    for alert in alerts {
        match groups.iter_mut().find(|(event, _)| *event == alert.event) {
            Some((_, members)) => members.push(alert),
            None => groups.push((alert.event.as_str(), vec![alert])),
        }
    }

    let mut lines = Vec::new();
    for (event, members) in &groups {
        lines.push(format!("**{event}** ({})", members.len()));
        for alert in members.iter().take(AREAS_PER_TYPE) {
            lines.push(format!(
                "  • {}",
                alert.area_desc.as_deref().unwrap_or("Unknown area")
            ));
        }
        if members.len() > AREAS_PER_TYPE {
            lines.push(format!("  *...and {} more*", members.len() - AREAS_PER_TYPE));
        }
    }

    truncate(&lines.join("\n"), MAX_EMBED_DESCRIPTION)
}

/// Renders the `/active` embed.
#[must_use]
pub fn active_embed(alerts: &[AlertRecord], now: DateTime<Utc>) -> Embed {
    Embed::new()
        .color(if alerts.is_empty() {
            COLOR_CLEAR
        } else {
            COLOR_FOUND
        })
        .title(format!("Active Fire Weather Alerts: {}", alerts.len()))
        .description(active_summary(alerts))
        .timestamp(now)
        .footer("Data from National Weather Service")
}

/// Renders the startup announcement.
#[must_use]
pub fn startup_embed(hazard_types: &[String], poll_interval: Duration, now: DateTime<Utc>) -> Embed {
    let types: Vec<String> = hazard_types.iter().map(|t| format!("• {t}")).collect();
    let commands: Vec<String> = Command::ALL
        .iter()
        .map(|c| format!("`/{}` - {}", c.name(), short_help(*c)))
        .collect();

    Embed::new()
        .color(COLOR_CLEAR)
        .title("Fire Weather Alert Bot Online")
        .description(format!(
            "Now monitoring for fire weather alerts across the United States.\n\n\
             **Alert Types Monitored:**\n{}\n\n**Commands:**\n{}",
            types.join("\n"),
            commands.join("\n")
        ))
        .timestamp(now)
        .footer(format!("Polling every {}", interval_text(poll_interval)))
}

const fn short_help(command: Command) -> &'static str {
    match command {
        Command::Test => "Send a test alert",
        Command::Status => "Show bot status",
        Command::Check => "Manually check for alerts",
        Command::Active => "Show active alerts",
    }
}
