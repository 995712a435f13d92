//! The alert feed seam.
//!
//! [`AlertSource`] hides how alerts are fetched. Implementations swallow
//! their own failures: a feed that cannot be reached yields an empty list,
//! and the next poll simply tries again.

use std::future::Future;
use std::pin::Pin;

use crate::types::AlertRecord;

/// A source of currently active hazard alerts.
pub trait AlertSource: Send + Sync {
    /// Fetches the active alerts that match the hazard filter, in feed order.
    ///
    /// Never fails: errors are logged by the implementation and produce an
    /// empty list.
    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<AlertRecord>> + Send + 'a>>;
}
