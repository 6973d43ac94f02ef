use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use log::{debug, info};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` keeps polling forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy { interval, max_attempts }
    }
}

/// The part of a failure that acceptable patterns are matched against.
pub trait FailureReason {
    fn reason(&self) -> Cow<'_, str>;
}

impl FailureReason for anyhow::Error {
    fn reason(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    /// The action failed with the acceptable error, so the state it was
    /// trying to reach already holds.
    AlreadyDone,
}

/// Polls `action` until the service inside a fresh container answers.
///
/// A failure whose [`FailureReason`] contains `acceptable` ends the loop as
/// [`Outcome::AlreadyDone`]. Every other failure is retried after
/// `policy.interval`, with no backoff. With an unbounded policy this only
/// returns once the action stops failing; with `max_attempts` set the last
/// error is returned when the attempts run out.
pub async fn retry_until_ready<T, E, F, Fut>(
    policy: &RetryPolicy,
    acceptable: Option<&str>,
    mut action: F,
) -> Result<Outcome<T>, E>
where
    E: FailureReason,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match action().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Succeeded after {} attempts", attempt);
                }
                return Ok(Outcome::Done(value));
            }
            Err(err) => {
                let reason = err.reason().into_owned();
                if let Some(pattern) = acceptable {
                    if reason.contains(pattern) {
                        debug!("Treating '{}' as already done: {}", pattern, reason.trim());
                        return Ok(Outcome::AlreadyDone);
                    }
                }
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        return Err(err);
                    }
                }
                debug!("Attempt {} failed, retrying: {}", attempt, reason.trim());
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}
