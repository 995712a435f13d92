//! Process lifetime and delivery statistics.

use chrono::{DateTime, Utc};

/// Counters and timestamps describing relay activity.
#[derive(Debug, Clone)]
pub struct StatsRecorder {
    start_time: DateTime<Utc>,
    alerts_sent: u64,
    last_check: Option<DateTime<Utc>>,
    last_alert: Option<DateTime<Utc>>,
}

/// A read-only view of the statistics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the recorder was created.
    pub uptime: chrono::Duration,
    /// Alerts delivered successfully.
    pub alerts_sent: u64,
    /// Identifiers currently held by the tracker.
    pub tracked: usize,
    /// Most recent poll attempt.
    pub last_check: Option<DateTime<Utc>>,
    /// Most recent successful delivery.
    pub last_alert: Option<DateTime<Utc>>,
}

impl StatsRecorder {
    /// Creates a recorder starting now.
    #[must_use]
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    /// Creates a recorder with an explicit start time.
    #[must_use]
    pub const fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            alerts_sent: 0,
            last_check: None,
            last_alert: None,
        }
    }

    /// Records a poll attempt, whatever its outcome.
    pub fn record_check(&mut self, now: DateTime<Utc>) {
        self.last_check = Some(now);
    }

    /// Records one successfully delivered alert.
    pub fn record_delivery(&mut self, now: DateTime<Utc>) {
        self.alerts_sent += 1;
        self.last_alert = Some(now);
    }

    /// Returns when the recorder was created.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the number of alerts delivered.
    #[must_use]
    pub const fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }

    /// Returns the most recent poll attempt.
    #[must_use]
    pub const fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    /// Returns the most recent successful delivery.
    #[must_use]
    pub const fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    /// Takes a snapshot, with `tracked` supplied by the dedup tracker.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>, tracked: usize) -> StatsSnapshot {
        StatsSnapshot {
            uptime: now.signed_duration_since(self.start_time),
            alerts_sent: self.alerts_sent,
            tracked,
            last_check: self.last_check,
            last_alert: self.last_alert,
        }
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
