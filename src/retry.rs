//! Bounded retry with fixed spacing
//!
//! Generic over the wrapped operation and its error type; the status updater
//! uses it for its re-fetch-then-write loop, but nothing here is specific to
//! any resource.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Run `operation` up to `attempts` times, sleeping `delay` between
/// attempts. The first success wins; once the budget is exhausted the final
/// error is returned unchanged.
pub async fn retry<T, E, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(_) => sleep(delay).await,
        }
    }
}
