//! Token-bucket I/O rate limiter gating file dispatch (spec §4.6, §5).

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared, mutable-rate token bucket. The adaptive controller adjusts the
/// rate in place; the walker blocks on `acquire()` after every dispatch.
pub struct IoLimiter {
    limiter: RwLock<Arc<Limiter>>,
    current_rate: AtomicU32,
}

impl IoLimiter {
    pub fn new(initial_rate_per_sec: u32) -> Self {
        let rate = initial_rate_per_sec.max(1);
        Self {
            limiter: RwLock::new(Arc::new(build_limiter(rate))),
            current_rate: AtomicU32::new(rate),
        }
    }

    /// Blocks the calling thread until one token is available.
    pub fn acquire(&self) {
        loop {
            let limiter = self.limiter.read().unwrap().clone();
            match limiter.check() {
                Ok(()) => return,
                Err(not_until) => {
                    let wait = not_until.wait_time_from(DefaultClock::default().now());
                    std::thread::sleep(wait);
                }
            }
        }
    }

    pub fn current_rate(&self) -> u32 {
        self.current_rate.load(Ordering::Relaxed)
    }

    /// Replaces the bucket with a new one at `rate_per_sec`. Called only
    /// by the adaptive controller, and only when the rate wasn't set
    /// explicitly by the user (spec §4.7).
    pub fn set_rate(&self, rate_per_sec: u32) {
        let rate = rate_per_sec.max(1);
        self.current_rate.store(rate, Ordering::Relaxed);
        *self.limiter.write().unwrap() = Arc::new(build_limiter(rate));
    }
}

fn build_limiter(rate_per_sec: u32) -> Limiter {
    let quota = Quota::per_second(NonZeroU32::new(rate_per_sec).unwrap());
    RateLimiter::direct(quota)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_does_not_block_under_rate() {
        let limiter = IoLimiter::new(1000);
        for _ in 0..10 {
            limiter.acquire();
        }
    }

    #[test]
    fn set_rate_updates_current_rate() {
        let limiter = IoLimiter::new(100);
        assert_eq!(limiter.current_rate(), 100);
        limiter.set_rate(500);
        assert_eq!(limiter.current_rate(), 500);
    }
}
