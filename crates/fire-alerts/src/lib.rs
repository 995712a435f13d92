//! Alert deduplication and relay core for firewatch.
//!
//! `fire-alerts` decides, across repeated polls of a hazard-alert feed, which
//! alerts are new and should be relayed, keeps its own memory bounded, and
//! records delivery statistics.
//!
//! # Features
//!
//! - **Dedup Tracker**: Insertion-ordered set of notified alert ids with a
//!   high-water-mark eviction pass
//! - **Statistics**: Uptime, delivery count, last check and last alert times
//! - **Poll Cycles**: At most one cycle at a time, shared by the timer and
//!   on-demand requests
//! - **Seams**: [`AlertSource`] and [`Notifier`] traits keep the feed client
//!   and chat platform out of the core
//!
//! # Example
//!
//! ```rust
//! use fire_alerts::DedupTracker;
//!
//! let mut tracker = DedupTracker::with_limits(3, 1).unwrap();
//! for id in ["A1", "A2", "A3", "A4"] {
//!     if tracker.is_new(id) {
//!         tracker.mark_seen(id);
//!     }
//! }
//!
//! assert_eq!(tracker.evict_if_oversize(), 3);
//! assert!(tracker.contains("A4"));
//! assert!(tracker.is_new("A1"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod notifier;
pub mod poller;
pub mod source;
pub mod stats;
pub mod tracker;
pub mod types;

// Re-export main types at crate root
pub use error::{AlertError, Result};
pub use notifier::Notifier;
pub use poller::{AlertPoller, PollerConfig};
pub use source::AlertSource;
pub use stats::{StatsRecorder, StatsSnapshot};
pub use tracker::{DEFAULT_HIGH_WATER_MARK, DEFAULT_RETAIN_COUNT, DedupTracker};
pub use types::{
    AlertRecord, DEFAULT_HAZARD_TYPES, HazardFilter, PollResult, PollTrigger, Severity,
};
