use std::future::Future;
use tracing::warn;

use super::RetryPolicy;
use crate::error::CaptureError;

/// Why `retry_transient` gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryExhausted {
    /// A non-transient error; returned on the attempt it happened
    Fatal(CaptureError),
    /// Every attempt failed transiently; carries the last error
    Attempts { attempts: u32, last: CaptureError },
}

/// Run `attempt` until it succeeds, fails non-transiently, or the policy's
/// attempts are used up. Sleeps `policy.delay()` between attempts, never
/// after the last one. The closure receives the 1-based attempt number.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CaptureError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut number = 1;

    loop {
        match attempt(number).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryExhausted::Fatal(e)),
            Err(e) if number >= max_attempts => {
                return Err(RetryExhausted::Attempts {
                    attempts: number,
                    last: e,
                })
            }
            Err(e) => {
                warn!(attempt = number, max_attempts, error = %e, "transient failure, retrying");
                tokio::time::sleep(policy.delay()).await;
                number += 1;
            }
        }
    }
}
