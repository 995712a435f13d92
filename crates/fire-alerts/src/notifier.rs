//! The delivery seam.
//!
//! [`Notifier`] renders an alert for its destination channel and sends it.
//! A failed delivery is reported as an error value and never aborts the
//! poll cycle that requested it.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::AlertRecord;

/// Delivers alerts to a destination channel.
pub trait Notifier: Send + Sync {
    /// Returns the name of the destination, for logging.
    fn name(&self) -> &str;

    /// Renders and delivers one alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::DeliveryFailed` if the destination rejected the
    /// message or could not be reached.
    fn deliver<'a>(
        &'a self,
        alert: &'a AlertRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
