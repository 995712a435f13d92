//! Background task supervision.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::error;

/// Spawns `future` and logs it at error level if it panics or is cancelled.
///
/// The returned handle completes when the task has finished and any fault
/// has been logged.
pub fn spawn_supervised<F>(name: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(future);
    tokio::spawn(async move {
        if let Err(e) = inner.await {
            log_join_error(name, &e);
        }
    })
}

/// Logs a join error from a background task.
pub fn log_join_error(name: &str, err: &JoinError) {
    if err.is_panic() {
        error!(task = %name, error = %err, "background task panicked");
    } else {
        error!(task = %name, error = %err, "background task was cancelled");
    }
}
