use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget shared by every fetch an adapter makes.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
}

impl RequestThrottle {
    /// Allows `limit` requests per `window`, all of which may burst at once.
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_for(window, limit))),
        }
    }

    /// Waits until one unit of budget is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle").finish_non_exhaustive()
    }
}

fn quota_for(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit.max(1)).unwrap_or(NonZeroU32::MIN);
    let per_cell = (window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    Quota::with_period(Duration::from_secs_f64(per_cell))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn acquired_within(throttle: &RequestThrottle, wait: Duration) -> bool {
        tokio::time::timeout(wait, throttle.acquire()).await.is_ok()
    }

    #[tokio::test]
    async fn burst_is_granted_then_callers_wait() {
        let throttle = RequestThrottle::new(Duration::from_secs(60), 2);

        assert!(acquired_within(&throttle, Duration::from_millis(50)).await);
        assert!(acquired_within(&throttle, Duration::from_millis(50)).await);
        assert!(!acquired_within(&throttle, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn zero_limit_is_treated_as_one() {
        let throttle = RequestThrottle::new(Duration::from_secs(60), 0);

        assert!(acquired_within(&throttle, Duration::from_millis(50)).await);
        assert!(!acquired_within(&throttle, Duration::from_millis(50)).await);
    }
}
