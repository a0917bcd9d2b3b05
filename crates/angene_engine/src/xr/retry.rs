//! Bounded retry policy for flaky runtime queries
//!
//! Some runtimes answer the first view-configuration query with empty data
//! while the compositor is still starting. The protocol client takes a
//! [`RetryPolicy`] and applies it at those call sites.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

/// Maximum attempts plus the delays around them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between failed attempts, in milliseconds
    pub backoff_ms: u64,
    /// Delay before the first attempt, in milliseconds
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
            initial_delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Policy with no delays
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_ms: 0,
            initial_delay_ms: 0,
        }
    }

    /// Delay between failed attempts
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Delay before the first attempt
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Run `attempt` until it succeeds or attempts run out, sleeping the thread
    ///
    /// The closure receives the zero-based attempt number. The last error is
    /// returned when every attempt fails.
    pub fn run<T, E: Display>(&self, label: &str, attempt: impl FnMut(u32) -> Result<T, E>) -> Result<T, E> {
        self.run_with_sleep(label, attempt, std::thread::sleep)
    }

    /// Same as [`Self::run`] with an injectable sleep function
    pub fn run_with_sleep<T, E: Display>(
        &self,
        label: &str,
        mut attempt: impl FnMut(u32) -> Result<T, E>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, E> {
        let attempts = self.max_attempts.max(1);
        if self.initial_delay_ms > 0 {
            sleep(self.initial_delay());
        }

        let mut index = 0;
        loop {
            match attempt(index) {
                Ok(value) => {
                    if index > 0 {
                        log::info!("{} succeeded on attempt {}/{}", label, index + 1, attempts);
                    }
                    return Ok(value);
                }
                Err(e) if index + 1 < attempts => {
                    log::warn!("{} attempt {}/{} failed: {}", label, index + 1, attempts, e);
                    if self.backoff_ms > 0 {
                        sleep(self.backoff());
                    }
                    index += 1;
                }
                Err(e) => {
                    log::warn!("{} failed after {} attempts: {}", label, attempts, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeds_after_failures() {
        let policy = RetryPolicy::default();
        let mut sleeps = Vec::new();
        let result: Result<u32, String> = policy.run_with_sleep(
            "query",
            |attempt| if attempt < 2 { Err(format!("empty {}", attempt)) } else { Ok(attempt) },
            |d| sleeps.push(d),
        );

        assert_eq!(result, Ok(2));
        assert_eq!(
            sleeps,
            vec![Duration::from_millis(50), Duration::from_millis(100), Duration::from_millis(100)]
        );
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result: Result<(), &str> = policy.run_with_sleep(
            "query",
            |_| {
                calls += 1;
                Err("no data")
            },
            |_| panic!("immediate policy must not sleep"),
        );

        assert_eq!(result, Err("no data"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy::immediate(0);
        let result: Result<i32, &str> = policy.run("query", |_| Ok(7));
        assert_eq!(result, Ok(7));
    }
}
