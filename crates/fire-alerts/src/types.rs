//! Core types for the alert relay.
//!
//! - [`AlertRecord`]: A hazard alert as published by the feed
//! - [`Severity`]: The feed's severity classification
//! - [`HazardFilter`]: The set of event types worth relaying
//! - [`PollTrigger`]: What started a poll cycle
//! - [`PollResult`]: The outcome of one poll cycle

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Event types relayed when no explicit filter is configured.
pub const DEFAULT_HAZARD_TYPES: [&str; 4] = [
    "Red Flag Warning",
    "Fire Weather Watch",
    "Fire Warning",
    "Extreme Fire Danger",
];

/// Severity classification attached to an alert by the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Extraordinary threat to life or property.
    Extreme,
    /// Significant threat to life or property.
    Severe,
    /// Possible threat to life or property.
    Moderate,
    /// Minimal to no known threat.
    Minor,
    /// Severity not known or not recognized.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Severity {
    /// Returns the severity as the feed spells it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extreme => "Extreme",
            Self::Severe => "Severe",
            Self::Moderate => "Moderate",
            Self::Minor => "Minor",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hazard alert record fetched from the feed.
///
/// Field names follow the feed's `properties` object so a record can be
/// deserialized straight from it. Absent text fields become empty or `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Identifier, unique per feed.
    pub id: String,
    /// Event type, e.g. "Red Flag Warning".
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: String,
    /// Severity classification.
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: Severity,
    /// Urgency classification.
    #[serde(default)]
    pub urgency: Option<String>,
    /// Certainty classification.
    #[serde(default)]
    pub certainty: Option<String>,
    /// One-line headline.
    #[serde(default)]
    pub headline: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Affected-area description.
    #[serde(default)]
    pub area_desc: Option<String>,
    /// When the alert takes effect.
    #[serde(default)]
    pub effective: Option<DateTime<Utc>>,
    /// When the alert expires.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// Canonical reference URL.
    #[serde(default, rename = "@id")]
    pub url: Option<String>,
}

/// Reads an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AlertRecord {
    /// Creates a record with only an identifier and event type set.
    #[must_use]
    pub fn new(id: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event: event.into(),
            severity: Severity::Unknown,
            urgency: None,
            certainty: None,
            headline: None,
            description: None,
            area_desc: None,
            effective: None,
            expires: None,
            url: None,
        }
    }

    /// Sets the severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets urgency and certainty.
    #[must_use]
    pub fn with_classification(
        mut self,
        urgency: impl Into<String>,
        certainty: impl Into<String>,
    ) -> Self {
        self.urgency = Some(urgency.into());
        self.certainty = Some(certainty.into());
        self
    }

    /// Sets the headline.
    #[must_use]
    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the affected area.
    #[must_use]
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area_desc = Some(area.into());
        self
    }

    /// Sets the effective and expiration times.
    #[must_use]
    pub const fn with_window(
        mut self,
        effective: DateTime<Utc>,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        self.effective = Some(effective);
        self.expires = expires;
        self
    }

    /// Sets the reference URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns the headline, falling back to the identifier.
    #[must_use]
    pub fn label(&self) -> &str {
        self.headline.as_deref().unwrap_or(&self.id)
    }
}

/// The event types an alert must match to be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardFilter {
    event_types: Vec<String>,
}

impl HazardFilter {
    /// Creates a filter over the given event types.
    #[must_use]
    pub fn new<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_types: event_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the alert's event type is monitored.
    #[must_use]
    pub fn matches(&self, alert: &AlertRecord) -> bool {
        self.event_types.iter().any(|t| *t == alert.event)
    }

    /// Keeps only the monitored alerts, preserving feed order.
    #[must_use]
    pub fn apply(&self, alerts: Vec<AlertRecord>) -> Vec<AlertRecord> {
        alerts.into_iter().filter(|a| self.matches(a)).collect()
    }

    /// Returns the monitored event types.
    #[must_use]
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }
}

impl Default for HazardFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HAZARD_TYPES)
    }
}

/// What started a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollTrigger {
    /// The interval timer fired.
    Scheduled,
    /// A user asked for a check.
    Manual,
}

impl PollTrigger {
    /// Returns the trigger as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for PollTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    /// Fetched alerts matching the hazard filter.
    pub total: usize,
    /// Alerts newly delivered in this cycle.
    pub new: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Extreme", Severity::Extreme ; "extreme")]
    #[test_case("Severe", Severity::Severe ; "severe")]
    #[test_case("Moderate", Severity::Moderate ; "moderate")]
    #[test_case("Minor", Severity::Minor ; "minor")]
    #[test_case("Unknown", Severity::Unknown ; "unknown")]
    #[test_case("Catastrophic", Severity::Unknown ; "unrecognized")]
    fn severity_from_feed(raw: &str, expected: Severity) {
        let parsed: Severity = serde_json::from_value(serde_json::json!(raw)).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Severe.to_string(), "Severe");
        assert_eq!(Severity::default().to_string(), "Unknown");
    }

    #[test]
    fn record_from_feed_properties() {
        let json = serde_json::json!({
            "@id": "https://api.weather.gov/alerts/urn:oid:2.49.0.1.840.0.abc",
            "id": "urn:oid:2.49.0.1.840.0.abc",
            "areaDesc": "Lassen; Plumas",
            "effective": "2024-08-01T10:00:00-07:00",
            "expires": "2024-08-01T20:00:00-07:00",
            "severity": "Severe",
            "certainty": "Likely",
            "urgency": "Expected",
            "event": "Red Flag Warning",
            "headline": "Red Flag Warning issued August 1",
            "description": "Gusty winds and low humidity."
        });

        let record: AlertRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.id, "urn:oid:2.49.0.1.840.0.abc");
        assert_eq!(record.event, "Red Flag Warning");
        assert_eq!(record.severity, Severity::Severe);
        assert_eq!(record.area_desc.as_deref(), Some("Lassen; Plumas"));
        assert_eq!(record.urgency.as_deref(), Some("Expected"));
        assert_eq!(
            record.url.as_deref(),
            Some("https://api.weather.gov/alerts/urn:oid:2.49.0.1.840.0.abc")
        );
        let effective = record.effective.unwrap();
        assert_eq!(effective.to_rfc3339(), "2024-08-01T17:00:00+00:00");
    }

    #[test]
    fn record_with_missing_fields() {
        let json = serde_json::json!({ "id": "A1", "headline": null });
        let record: AlertRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.id, "A1");
        assert!(record.event.is_empty());
        assert_eq!(record.severity, Severity::Unknown);
        assert!(record.headline.is_none());
        assert!(record.expires.is_none());
    }

    #[test]
    fn record_with_null_severity_and_event() {
        let json = serde_json::json!({
            "id": "A1",
            "event": null,
            "severity": null,
            "expires": null
        });
        let record: AlertRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.id, "A1");
        assert!(record.event.is_empty());
        assert_eq!(record.severity, Severity::Unknown);
    }

    #[test]
    fn record_label_falls_back_to_id() {
        let bare = AlertRecord::new("A1", "Fire Warning");
        assert_eq!(bare.label(), "A1");

        let titled = bare.with_headline("Fire Warning for Butte County");
        assert_eq!(titled.label(), "Fire Warning for Butte County");
    }

    #[test]
    fn default_filter_covers_fire_types() {
        let filter = HazardFilter::default();
        assert_eq!(filter.event_types().len(), 4);
        assert!(filter.matches(&AlertRecord::new("A1", "Red Flag Warning")));
        assert!(filter.matches(&AlertRecord::new("A2", "Extreme Fire Danger")));
        assert!(!filter.matches(&AlertRecord::new("A3", "Flood Watch")));
    }

    #[test]
    fn filter_is_exact_match() {
        let filter = HazardFilter::new(["Fire Warning"]);
        assert!(!filter.matches(&AlertRecord::new("A1", "fire warning")));
        assert!(!filter.matches(&AlertRecord::new("A2", "Fire Warning Test")));
    }

    #[test]
    fn filter_apply_preserves_order() {
        let filter = HazardFilter::default();
        let alerts = vec![
            AlertRecord::new("A1", "Fire Weather Watch"),
            AlertRecord::new("A2", "Flood Watch"),
            AlertRecord::new("A3", "Red Flag Warning"),
        ];

        let kept: Vec<_> = filter.apply(alerts).into_iter().map(|a| a.id).collect();
        assert_eq!(kept, vec!["A1", "A3"]);
    }

    #[test]
    fn trigger_display() {
        assert_eq!(PollTrigger::Scheduled.to_string(), "scheduled");
        assert_eq!(PollTrigger::Manual.to_string(), "manual");
    }
}
