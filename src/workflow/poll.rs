//! Bounded polling for asynchronous build processing.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Fixed-interval retry policy: no backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Longest time the poll can wait in total
    pub fn ceiling(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    /// 30 probes, 30 seconds apart
    fn default() -> Self {
        Self::new(30, Duration::from_secs(30))
    }
}

/// Suspends the poll between probes.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<T: Sleeper> Sleeper for &T {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Real wall-clock sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// A probe returned a value
    Found { value: T, attempts: u32 },
    /// Every probe came back empty
    Exhausted {
        attempts: u32,
        /// Message of the last probe that failed outright, if any
        last_error: Option<String>,
    },
}

/// Probe until a value shows up or the policy runs out.
///
/// A failing probe counts as an empty one: the poll is where waiting for App
/// Store Connect is retried, so one transient error does not end it.
/// `on_wait(attempt, policy)` runs before each sleep; there is no sleep after
/// the final probe.
pub async fn poll_until<T, E, F, Fut, S, W>(
    policy: RetryPolicy,
    sleeper: &S,
    mut on_wait: W,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
    S: Sleeper + ?Sized,
    W: FnMut(u32, &RetryPolicy),
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match probe(attempt).await {
            Ok(Some(value)) => {
                log::info!("Poll succeeded on attempt {}/{}", attempt, policy.max_attempts);
                return PollOutcome::Found {
                    value,
                    attempts: attempt,
                };
            }
            Ok(None) => log::debug!("Attempt {}/{}: not ready", attempt, policy.max_attempts),
            Err(e) => {
                log::warn!("Attempt {}/{} failed: {}", attempt, policy.max_attempts, e);
                last_error = Some(e.to_string());
            }
        }

        if attempt < policy.max_attempts {
            on_wait(attempt, &policy);
            sleeper.sleep(policy.delay).await;
        }
    }

    PollOutcome::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn stops_on_first_find() {
        let sleeper = RecordingSleeper::default();
        let mut probes = 0;

        let outcome = poll_until(RetryPolicy::default(), &sleeper, |_, _| {}, |attempt| {
            probes += 1;
            async move { Ok::<_, String>((attempt == 3).then(|| "build-3".to_string())) }
        })
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Found {
                value: "build-3".to_string(),
                attempts: 3
            }
        );
        assert_eq!(probes, 3);
        assert_eq!(sleeper.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn never_exceeds_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let mut probes = 0;
        let mut waits = Vec::new();

        let outcome = poll_until(
            RetryPolicy::default(),
            &sleeper,
            |attempt, _| waits.push(attempt),
            |_| {
                probes += 1;
                async { Ok::<Option<String>, String>(None) }
            },
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Exhausted {
                attempts: 30,
                last_error: None
            }
        );
        assert_eq!(probes, 30);
        assert_eq!(waits, (1..30).collect::<Vec<u32>>());

        let slept = sleeper.slept.lock().unwrap();
        assert_eq!(slept.len(), 29);
        assert!(slept.iter().all(|d| *d == Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn probe_errors_count_as_misses() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let outcome = poll_until(policy, &sleeper, |_, _| {}, |attempt| async move {
            match attempt {
                1 => Err("HTTP 503".to_string()),
                2 => Ok(None),
                _ => Ok(Some(attempt)),
            }
        })
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Found {
                value: 3,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn exhausted_keeps_last_error() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let outcome = poll_until(policy, &sleeper, |_, _| {}, |_| async {
            Err::<Option<()>, _>("timeout".to_string())
        })
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Exhausted {
                attempts: 2,
                last_error: Some("timeout".to_string())
            }
        );
    }

    #[test]
    fn default_ceiling_is_under_fifteen_minutes() {
        assert_eq!(RetryPolicy::default().ceiling(), Duration::from_secs(29 * 30));
    }
}
