//! Backoff policy for provider fetches.

use std::time::Duration;

use crate::SourceError;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * factor^attempt`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let millis = (seconds * 1_000.0) as u64;
                if !jitter || millis == 0 {
                    return Duration::from_millis(millis);
                }
                let spread = millis / 2;
                Duration::from_millis(millis - spread + fastrand::u64(0..=spread * 2))
            }
        }
    }
}

/// How many times, and after which failures, a fetch is repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Whether another attempt should follow `error` after `attempt` retries.
    pub fn should_retry(&self, attempt: u32, error: &SourceError) -> bool {
        attempt < self.max_retries && error.retryable()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_until_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_millis(500),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_half_of_the_base_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(200),
            factor: 1.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..20 {
            let delay = backoff.delay(0).as_millis();
            assert!((100..=300).contains(&delay), "delay {delay}ms out of range");
        }
    }

    #[test]
    fn only_retryable_errors_are_repeated() {
        let config = RetryConfig::fixed(Duration::from_millis(1), 2);

        assert!(config.should_retry(0, &SourceError::unavailable("503")));
        assert!(config.should_retry(1, &SourceError::timeout("slow")));
        assert!(!config.should_retry(2, &SourceError::unavailable("503")));
        assert!(!config.should_retry(0, &SourceError::invalid_request("404")));
        assert!(config.should_retry_status(429));
        assert!(!config.should_retry_status(404));
    }
}
