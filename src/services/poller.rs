use std::future::Future;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::config::PollPolicy;
use crate::error::TilerError;

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Calls `fetch` until `is_done` accepts its result.
///
/// The first call is made immediately, later ones are spaced by
/// `policy.interval`. Errors from `fetch` end the loop at once. The loop also
/// ends with [`TilerError::PollTimeout`] when the policy's attempt or time
/// budget runs out, and with [`TilerError::Cancelled`] when `cancel` fires.
pub async fn poll_until<T, F, Fut, P>(
    what: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut fetch: F,
    is_done: P,
) -> Result<PollOutcome<T>, TilerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TilerError>>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(TilerError::Cancelled);
        }

        attempts += 1;
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TilerError::Cancelled),
            res = fetch() => res?,
        };

        if is_done(&value) {
            return Ok(PollOutcome { value, attempts });
        }

        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = policy
            .timeout
            .is_some_and(|limit| started.elapsed().saturating_add(policy.interval) > limit);
        if out_of_attempts || out_of_time {
            return Err(TilerError::PollTimeout {
                what: what.to_string(),
                attempts,
            });
        }

        if policy.interval.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TilerError::Cancelled),
            _ = sleep(policy.interval) => {}
        }
    }
}
