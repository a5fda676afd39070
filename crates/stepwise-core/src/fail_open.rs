//! Fail-open utilities for side effects that must not fail a step
//!
//! Screenshots, page teardown and report writing are recorded on a best-effort
//! basis: a failure is logged and the run continues.
//!
//! DO NOT use fail-open for:
//! - Action execution (the step result must reflect it)
//! - Interpretation (failures become step failures)
//! - Outcome evaluation

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute a best-effort operation
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```no_run
/// use stepwise_core::fail_open::fail_open;
/// use stepwise_core::Result;
///
/// async fn capture() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let saved = fail_open("screenshot", || capture()).await;
///     // saved is None if capture() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Like fail_open but retries with linear backoff
///
/// The backoff duration is `100ms * attempt`.
pub async fn fail_open_with_retries<F, Fut, T>(
    operation_name: &str,
    mut f: F,
    max_retries: usize,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=max_retries {
        match f().await {
            Ok(val) => return Some(val),
            Err(e) => {
                if attempt == max_retries {
                    warn!(
                        "{} failed after {} retries (fail-open): {}",
                        operation_name, max_retries, e
                    );
                    return None;
                }
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_retries, e
                );
                let delay_ms = 100 * attempt as u64;
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
            }
        }
    }
    None
}
