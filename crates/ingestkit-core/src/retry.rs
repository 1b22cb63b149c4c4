use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Doubling-delay retry policy shared by the API and database connectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,
    /// Delay before the first retry, doubled after each one (default: 2s)
    #[serde(with = "secs_f64")]
    pub initial_delay: Duration,
    /// Whether transport failures (refused, timeout, DNS) are retried like
    /// non-2xx statuses. Off by default: only HTTP status failures are retried.
    pub retry_transport_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            retry_transport_errors: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn retry_transport_errors(mut self, enabled: bool) -> Self {
        self.retry_transport_errors = enabled;
        self
    }

    /// The sleep before each retry, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|i| self.initial_delay.saturating_mul(2u32.saturating_pow(i)))
    }
}

/// Result of a single attempt that failed
#[derive(Debug)]
pub enum Attempt<E> {
    /// Transient failure, try again if retries remain
    Retry(E),
    /// Permanent failure, give up immediately
    Abort(E),
}

/// Final failure of a retried operation
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    /// Attempts made, including the first
    pub attempts: u32,
    /// True when the failure came from running out of retries
    pub exhausted: bool,
}

/// Run `op` until it succeeds, aborts, or retries run out.
///
/// `op` receives the 1-based attempt number. Between attempts we sleep for
/// the current delay and then double it.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let mut delays = policy.delays();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Abort(error)) => {
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    exhausted: false,
                });
            }
            Err(Attempt::Retry(error)) => match delays.next() {
                Some(delay) => {
                    tracing::warn!(
                        target: "ingestkit::retry",
                        what,
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                        exhausted: true,
                    });
                }
            },
        }
    }
}

mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_default_delays_double() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn test_no_retry_has_no_delays() {
        assert_eq!(RetryPolicy::no_retry().delays().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Cell::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<&str, RetryFailure<String>> =
            with_backoff(&RetryPolicy::default(), "test", |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 3 {
                        Err(Attempt::Retry(format!("failure {}", attempt)))
                    } else {
                        Ok("connected")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(calls.get(), 3);
        // 2s + 4s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_retries() {
        let calls = Cell::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = with_backoff(&RetryPolicy::default(), "test", |_| {
            calls.set(calls.get() + 1);
            async { Err(Attempt::Retry("boom")) }
        })
        .await;

        let failure = result.unwrap_err();
        assert!(failure.exhausted);
        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.error, "boom");
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_immediately() {
        let calls = Cell::new(0);

        let result: Result<(), _> = with_backoff(&RetryPolicy::default(), "test", |_| {
            calls.set(calls.get() + 1);
            async { Err(Attempt::Abort("not found")) }
        })
        .await;

        let failure = result.unwrap_err();
        assert!(!failure.exhausted);
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_policy_deserializes_seconds() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 5, "initial_delay": 0.5}"#).unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert!(!policy.retry_transport_errors);
    }
}
