use std::future::Future;
use std::time::Duration;

/// Run `op` until it succeeds or `1 + retries` attempts have failed, sleeping
/// `delay` between attempts. Returns the last error and the attempt count.
pub async fn with_retries<T, F, Fut>(
    what: &str,
    retries: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, (anyhow::Error, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt > retries {
                    log::error!("{} failed after {} attempts: {:#}", what, attempt, e);
                    return Err((e, attempt));
                }
                log::warn!("{} attempt {} failed: {:#}. Retrying in {:?}...", what, attempt, e, delay);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
