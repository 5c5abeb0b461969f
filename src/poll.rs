//! Blocking completion polling with a pluggable clock.
//!
//! The SDK has no notifications for measurement completion; callers
//! repeatedly ask and sleep in between. [`Poller`] owns that loop so the
//! sleeping can be swapped out in tests.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::PollSettings;

/// Shortest sleep between polls taken from settings.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub trait Clock {
    /// Monotonic time since an arbitrary fixed point.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
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

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("Condition not met after {attempts} polls ({elapsed:?})")]
    Timeout { elapsed: Duration, attempts: u32 },

    #[error(transparent)]
    Check(E),
}

#[derive(Debug, Clone)]
pub struct Poller<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    backoff: u32,
    max_interval: Duration,
    timeout: Option<Duration>,
}

impl Poller<SystemClock> {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(SystemClock::new(), interval)
    }

    /// Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn from_settings(settings: &PollSettings) -> Self {
        let poller = Self::new(settings.interval().max(MIN_INTERVAL))
            .backoff(settings.backoff, settings.max_interval());
        match settings.timeout() {
            Some(timeout) => poller.timeout(timeout),
            None => poller,
        }
    }
}

impl Default for Poller<SystemClock> {
    fn default() -> Self {
        Self::from_settings(&PollSettings::default())
    }
}

impl<C: Clock> Poller<C> {
    pub fn with_clock(clock: C, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            backoff: 1,
            max_interval: interval,
            timeout: None,
        }
    }

    /// Multiply the sleep by `factor` after every unsuccessful poll, up to `max_interval`.
    pub fn backoff(mut self, factor: u32, max_interval: Duration) -> Self {
        self.backoff = factor.max(1);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Call `check` until it yields a value.
    ///
    /// `check` runs at least once. Its errors end the loop immediately.
    pub fn poll<T, E>(
        &self,
        mut check: impl FnMut() -> Result<Option<T>, E>,
    ) -> Result<T, PollError<E>> {
        let start = self.clock.now();
        let mut interval = self.interval;
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            if let Some(value) = check().map_err(PollError::Check)? {
                return Ok(value);
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if let Some(timeout) = self.timeout {
                if elapsed >= timeout {
                    return Err(PollError::Timeout { elapsed, attempts });
                }
            }

            self.clock.sleep(interval);
            interval = interval.saturating_mul(self.backoff).min(self.max_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeClock;

    #[test]
    fn test_polls_until_ready() {
        let poller = Poller::with_clock(FakeClock::new(), Duration::from_millis(10));
        let mut remaining = 4;
        let value = poller
            .poll(|| {
                if remaining == 0 {
                    return Ok::<_, ()>(Some("done"));
                }
                remaining -= 1;
                Ok(None)
            })
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(poller.clock().sleeps(), vec![Duration::from_millis(10); 4]);
    }

    #[test]
    fn test_ready_on_first_check_does_not_sleep() {
        let poller = Poller::with_clock(FakeClock::new(), Duration::from_millis(10));
        let value = poller.poll(|| Ok::<_, ()>(Some(7))).unwrap();
        assert_eq!(value, 7);
        assert!(poller.clock().sleeps().is_empty());
    }

    #[test]
    fn test_backoff_is_capped() {
        let poller = Poller::with_clock(FakeClock::new(), Duration::from_millis(10))
            .backoff(2, Duration::from_millis(50));
        let mut remaining = 5;
        poller
            .poll(|| {
                if remaining == 0 {
                    return Ok::<_, ()>(Some(()));
                }
                remaining -= 1;
                Ok(None)
            })
            .unwrap();

        let millis: Vec<u128> = poller.clock().sleeps().iter().map(Duration::as_millis).collect();
        assert_eq!(millis, vec![10, 20, 40, 50, 50]);
    }

    #[test]
    fn test_timeout() {
        let poller = Poller::with_clock(FakeClock::new(), Duration::from_millis(10))
            .timeout(Duration::from_millis(35));
        let result = poller.poll(|| Ok::<Option<()>, ()>(None));

        match result {
            Err(PollError::Timeout { elapsed, attempts }) => {
                assert_eq!(attempts, 5);
                assert_eq!(elapsed, Duration::from_millis(40));
            }
            other => unreachable!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_interval_setting_still_sleeps() {
        let settings = PollSettings {
            interval_ms: 0,
            max_interval_ms: 0,
            ..PollSettings::default()
        };
        let poller = Poller::from_settings(&settings);
        assert_eq!(poller.interval, MIN_INTERVAL);
        assert_eq!(poller.max_interval, MIN_INTERVAL);

        let poller = Poller::from_settings(&PollSettings::default());
        assert_eq!(poller.interval, Duration::from_millis(10));
    }

    #[test]
    fn test_check_error_stops_polling() {
        let poller = Poller::with_clock(FakeClock::new(), Duration::from_millis(10));
        let mut calls = 0;
        let result: Result<(), _> = poller.poll(|| {
            calls += 1;
            if calls == 3 {
                Err("device fault")
            } else {
                Ok(None)
            }
        });

        assert!(matches!(result, Err(PollError::Check("device fault"))));
        assert_eq!(calls, 3);
    }
}
