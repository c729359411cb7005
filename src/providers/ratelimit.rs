//! Client-side token bucket rate limiter.
//!
//! Grounded on spec.md §9's design note for `VIDEO_CLAUDE_RPM`: a sliding
//! 60-second window capped at a configured requests-per-minute rate, so a
//! single process doesn't trip the backend's own 429s under burst load.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window request-per-minute limiter, one per provider backend.
pub struct RateLimiter {
    max_per_minute: u32,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Block (via async sleep) until a slot under `max_per_minute` opens.
    /// `max_per_minute == 0` disables the limiter entirely.
    pub async fn acquire(&self) {
        if self.max_per_minute == 0 {
            return;
        }
        loop {
            let wait = {
                let mut window = self.timestamps.lock().expect("ratelimit mutex poisoned");
                let now = Instant::now();
                while window.front().is_some_and(|t| now.duration_since(*t) > Duration::from_secs(60)) {
                    window.pop_front();
                }
                if window.len() < self.max_per_minute as usize {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().unwrap();
                    Some(Duration::from_secs(60) - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_limiter_never_blocks() {
        let limiter = RateLimiter::new(0);
        for _ in 0..10 {
            limiter.acquire().await;
        }
    }

    #[tokio::test]
    async fn under_cap_does_not_block() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
