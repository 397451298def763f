use std::{future::Future, time::Duration};

use tracing::{debug, warn};

/// Calls `attempt` until it succeeds, sleeping a fixed `delay` after each failure.
///
/// There is no attempt limit; callers stop the loop by dropping or aborting the future.
pub async fn retry_until_ok<T, F, Fut>(operation: &'static str, delay: Duration, mut attempt: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempts: u64 = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => {
                debug!(operation, attempts, "retried operation succeeded");
                return value;
            }
            Err(err) => {
                warn!(
                    operation,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "operation failed, retrying: {err:#}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
