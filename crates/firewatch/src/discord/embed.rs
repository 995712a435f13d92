//! Discord message payloads and alert rendering.

use chrono::{DateTime, Utc};
use fire_alerts::{AlertRecord, Severity};
use serde::{Deserialize, Serialize};

/// Longest alert description placed in an embed.
pub const MAX_ALERT_DESCRIPTION: usize = 2000;

/// Longest description Discord accepts in a single embed.
pub const MAX_EMBED_DESCRIPTION: usize = 4000;

/// Status / informational blue.
pub const COLOR_INFO: u32 = 0x0099_FF;
/// Nothing to report.
pub const COLOR_CLEAR: u32 = 0x00AA_00;
/// Something was found.
pub const COLOR_FOUND: u32 = 0xFF66_00;

/// A field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field title.
    pub name: String,
    /// Field body.
    pub value: String,
    /// Whether the field shares a row with its neighbours.
    #[serde(default)]
    pub inline: bool,
}

/// Embed footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
}

/// Embed author line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    /// Author name.
    pub name: String,
}

/// A Discord rich embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Link attached to the title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sidebar color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// ISO 8601 timestamp shown in the footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// Author line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    /// Fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    /// Creates an empty embed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the title link.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the color.
    #[must_use]
    pub const fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at.to_rfc3339());
        self
    }

    /// Sets the footer text.
    #[must_use]
    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    /// Sets the author line.
    #[must_use]
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.author = Some(EmbedAuthor { name: name.into() });
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// The body of a channel message or interaction reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Plain text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Embeds.
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

impl MessagePayload {
    /// Creates a message carrying a single embed.
    #[must_use]
    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embeds: vec![embed],
        }
    }

    /// Creates a plain text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
        }
    }
}

/// Picks the sidebar color for an alert.
///
/// Known fire event types have fixed colors; anything else is colored by
/// severity.
#[must_use]
pub fn alert_color(event: &str, severity: Severity) -> u32 {
    match event {
        "Red Flag Warning" | "Extreme Fire Danger" => 0xFF00_00,
        "Fire Warning" => 0xFF45_00,
        "Fire Weather Watch" => 0xFFAA_00,
        _ => match severity {
            Severity::Extreme => 0xFF00_00,
            Severity::Severe => 0xFF66_00,
            Severity::Moderate => 0xFFCC_00,
            Severity::Minor => 0x00FF_00,
            Severity::Unknown => 0x8080_80,
        },
    }
}

/// Shortens text to at most `max` characters, ending in "..." when cut.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Formats a time as Discord timestamp markup, rendered in each reader's zone.
#[must_use]
pub fn discord_time(at: DateTime<Utc>, style: char) -> String {
    format!("<t:{}:{style}>", at.timestamp())
}

/// Renders an alert as an embed.
///
/// `now` stands in for a missing effective time. Test renders are marked
/// in the title and footer.
#[must_use]
pub fn alert_embed(alert: &AlertRecord, test: bool, now: DateTime<Utc>) -> Embed {
    let event = if alert.event.is_empty() {
        "Fire Alert"
    } else {
        alert.event.as_str()
    };
    let description = alert
        .description
        .as_deref()
        .unwrap_or("No description available");
    let title = if test {
        format!("TEST - {event}")
    } else {
        event.to_string()
    };

    let mut embed = Embed::new()
        .color(alert_color(event, alert.severity))
        .title(title)
        .description(truncate(description, MAX_ALERT_DESCRIPTION))
        .field("Area", alert.area_desc.as_deref().unwrap_or("Unknown"), false)
        .field("Severity", alert.severity.as_str(), true)
        .field("Urgency", alert.urgency.as_deref().unwrap_or("Unknown"), true)
        .field(
            "Certainty",
            alert.certainty.as_deref().unwrap_or("Unknown"),
            true,
        )
        .timestamp(alert.effective.unwrap_or(now))
        .footer(if test {
            "TEST ALERT - Not Real"
        } else {
            "National Weather Service"
        });

    if let Some(headline) = &alert.headline {
        embed = embed.author(headline.clone());
    }
    if let Some(expires) = alert.expires {
        embed = embed.field("Expires", discord_time(expires, 'f'), false);
    }
    if let Some(url) = &alert.url {
        embed = embed.url(url.clone());
    }

    embed
}
