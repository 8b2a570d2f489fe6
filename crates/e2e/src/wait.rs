//! The one polling primitive every wait in the harness goes through

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use pagewalk_common::TimeoutConfig;

use crate::error::{E2eError, E2eResult};

/// Source of time for waits; swapped for a manual clock in tests
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How long to keep polling and how often
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self::new(timeouts.default_timeout(), timeouts.poll_interval())
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Outcome of one poll
#[derive(Debug)]
pub enum Probe<T> {
    Ready(T),
    /// Not there yet; carries what was observed for the failure message
    Pending(String),
}

/// Poll `probe` until it is ready or `policy.timeout` has elapsed.
///
/// The probe always runs at least once, so a zero timeout still checks the
/// current state. Errors from the probe abort the wait immediately.
pub async fn wait_until<T, F, Fut>(
    clock: &dyn Clock,
    policy: WaitPolicy,
    description: &str,
    mut probe: F,
) -> E2eResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Probe<T>>>,
{
    let start = clock.now();
    let mut polls = 0usize;
    loop {
        polls += 1;
        let last_observed = match probe().await? {
            Probe::Ready(value) => {
                if polls > 1 {
                    debug!("{} satisfied after {} polls", description, polls);
                }
                return Ok(value);
            }
            Probe::Pending(observed) => observed,
        };

        let elapsed = clock.now().saturating_sub(start);
        if elapsed >= policy.timeout {
            return Err(E2eError::AssertionTimeout {
                description: description.to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
                last_observed,
            });
        }

        let remaining = policy.timeout - elapsed;
        clock.sleep(policy.poll_interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy(timeout_ms: u64, poll_ms: u64) -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(timeout_ms), Duration::from_millis(poll_ms))
    }

    #[tokio::test]
    async fn test_ready_on_first_poll() {
        let clock = ManualClock::new();
        let value = wait_until(&clock, policy(1000, 100), "answer", || async {
            Ok(Probe::Ready(42))
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_ready_after_some_polls() {
        let clock = ManualClock::new();
        let calls = AtomicUsize::new(0);
        let value = wait_until(&clock, policy(1000, 100), "third poll", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n >= 2 {
                    Ok(Probe::Ready(n))
                } else {
                    Ok(Probe::Pending(format!("poll {}", n)))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
        assert_eq!(clock.now(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_times_out_with_last_observation() {
        let clock = ManualClock::new();
        let calls = AtomicUsize::new(0);
        let err = wait_until(&clock, policy(1000, 300), "never", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<Probe<()>, E2eError>(Probe::Pending(format!("state {}", n))) }
        })
        .await
        .unwrap_err();

        match err {
            E2eError::AssertionTimeout {
                description,
                elapsed_ms,
                last_observed,
            } => {
                assert_eq!(description, "never");
                assert_eq!(elapsed_ms, 1000);
                // polls at 0, 300, 600, 900 and a final one at the deadline
                assert_eq!(last_observed, "state 4");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_zero_timeout_checks_once() {
        let clock = ManualClock::new();
        let calls = AtomicUsize::new(0);
        let result = wait_until(&clock, policy(0, 50), "instant", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<Probe<()>, E2eError>(Probe::Pending("nothing".into())) }
        })
        .await;
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_error_aborts_wait() {
        let clock = ManualClock::new();
        let result: E2eResult<()> = wait_until(&clock, policy(1000, 10), "broken", || async {
            Err(E2eError::NoSession)
        })
        .await;
        assert!(matches!(result, Err(E2eError::NoSession)));
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
