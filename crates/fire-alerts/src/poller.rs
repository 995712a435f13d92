//! Poll-cycle orchestration.
//!
//! This module provides the [`AlertPoller`], which owns the dedup tracker and
//! statistics and runs the fetch, filter-new, notify, record-stats pass.
//! The timer and on-demand commands share one poller; an async mutex makes
//! overlapping requests queue behind the running cycle so no alert is ever
//! counted or delivered twice.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::notifier::Notifier;
use crate::source::AlertSource;
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::tracker::{DEFAULT_HIGH_WATER_MARK, DEFAULT_RETAIN_COUNT, DedupTracker};
use crate::types::{PollResult, PollTrigger};

/// Configuration for the alert poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Minimum gap between two delivery attempts within one cycle.
    pub delivery_spacing: Duration,
    /// Tracker size above which the eviction pass trims it.
    pub high_water_mark: usize,
    /// Identifiers kept by the eviction pass.
    pub retain_count: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            delivery_spacing: Duration::from_secs(1),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            retain_count: DEFAULT_RETAIN_COUNT,
        }
    }
}

/// Runs poll cycles against an alert source and a notifier.
pub struct AlertPoller {
    config: PollerConfig,
    source: Arc<dyn AlertSource>,
    notifier: Arc<dyn Notifier>,
    tracker: RwLock<DedupTracker>,
    stats: RwLock<StatsRecorder>,
    /// Held for the whole of a cycle.
    cycle: Mutex<()>,
}

impl AlertPoller {
    /// Creates a poller with the default configuration.
    #[must_use]
    pub fn new(source: Arc<dyn AlertSource>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config: PollerConfig::default(),
            source,
            notifier,
            tracker: RwLock::new(DedupTracker::new()),
            stats: RwLock::new(StatsRecorder::new()),
            cycle: Mutex::new(()),
        }
    }

    /// Creates a poller with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if the tracker limits are invalid.
    pub fn with_config(
        config: PollerConfig,
        source: Arc<dyn AlertSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let tracker = DedupTracker::with_limits(config.high_water_mark, config.retain_count)?;

        Ok(Self {
            config,
            source,
            notifier,
            tracker: RwLock::new(tracker),
            stats: RwLock::new(StatsRecorder::new()),
            cycle: Mutex::new(()),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Returns the alert source, for queries that bypass deduplication.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn AlertSource> {
        &self.source
    }

    /// Returns the number of tracked alert identifiers.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.tracker.read().len()
    }

    /// Returns true if the identifier has already been handled.
    #[must_use]
    pub fn has_seen(&self, id: &str) -> bool {
        self.tracker.read().contains(id)
    }

    /// Returns true while a cycle is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.cycle.try_lock().is_err()
    }

    /// Takes a statistics snapshot.
    ///
    /// Both read guards are held while the snapshot is built. During a
    /// cycle, `tracked` already counts an identifier whose delivery is still
    /// in flight, so it can run ahead of `alerts_sent`.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let tracker = self.tracker.read();
        let stats = self.stats.read();
        stats.snapshot(Utc::now(), tracker.len())
    }

    /// Runs one poll cycle.
    ///
    /// Waits for any cycle already in progress to finish first. Each alert
    /// identifier gets at most one delivery attempt for the lifetime of the
    /// poller: a failed delivery is logged and the identifier stays marked.
    /// Scheduled cycles finish with an eviction pass.
    pub async fn poll(&self, trigger: PollTrigger) -> PollResult {
        if self.is_polling() {
            debug!(%trigger, "poll cycle already running, waiting");
        }
        let _cycle = self.cycle.lock().await;

        let alerts = self.source.fetch().await;
        self.stats.write().record_check(Utc::now());

        let mut result = PollResult {
            total: alerts.len(),
            new: 0,
        };
        let mut attempts = 0usize;

        for alert in &alerts {
            let fresh = {
                let mut tracker = self.tracker.write();
                tracker.is_new(&alert.id) && tracker.mark_seen(&alert.id)
            };
            if !fresh {
                continue;
            }

            if attempts > 0 && !self.config.delivery_spacing.is_zero() {
                tokio::time::sleep(self.config.delivery_spacing).await;
            }
            attempts += 1;

            match self.notifier.deliver(alert).await {
                Ok(()) => {
                    self.stats.write().record_delivery(Utc::now());
                    result.new += 1;
                    info!(
                        alert_id = %alert.id,
                        event = %alert.event,
                        headline = %alert.label(),
                        channel = %self.notifier.name(),
                        "sent alert"
                    );
                }
                Err(e) => {
                    warn!(
                        alert_id = %alert.id,
                        channel = %self.notifier.name(),
                        error = %e,
                        "failed to deliver alert, not retrying"
                    );
                }
            }
        }

        if result.new > 0 {
            info!(new = result.new, total = result.total, %trigger, "sent new alerts");
        }

        if trigger == PollTrigger::Scheduled {
            self.tracker.write().evict_if_oversize();
        }

        debug!(
            %trigger,
            total = result.total,
            new = result.new,
            failed = attempts - result.new,
            "poll cycle complete"
        );

        result
    }

    /// Polls on a fixed interval forever, starting immediately.
    ///
    /// A tick that comes due while a cycle is still running is delayed
    /// rather than fired in a burst. Each cycle runs in its own task; a
    /// cycle that panics is logged and the next tick polls as usual.
    pub async fn run_scheduled(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "starting scheduled polling");

        loop {
            ticker.tick().await;
            let poller = Arc::clone(&self);
            let cycle = tokio::spawn(async move { poller.poll(PollTrigger::Scheduled).await });
            if let Err(e) = cycle.await {
                error!(error = %e, panicked = e.is_panic(), "scheduled poll cycle aborted");
            }
        }
    }
}

impl fmt::Debug for AlertPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertPoller")
            .field("config", &self.config)
            .field("notifier", &self.notifier.name())
            .field("tracked", &self.tracked())
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}
