//! Per-socket message throttling.
//!
//! Every WebSocket gets one [`RateLimiter`] enforcing a short burst window
//! and a longer sustained window. A message must fit in both.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Which window refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimited {
    #[error("Rate limit exceeded. Please slow down.")]
    Burst,

    #[error("Too many messages. Please wait before sending more.")]
    Sustained,
}

/// Sliding log of recent message times, capped at `limit` within `window`.
#[derive(Debug)]
struct Window {
    hits: VecDeque<Instant>,
    limit: usize,
    window: Duration,
}

impl Window {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            hits: VecDeque::with_capacity(limit),
            limit,
            window,
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(oldest) = self.hits.front() {
            if now.duration_since(*oldest) > self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_full(&self) -> bool {
        self.hits.len() >= self.limit
    }
}

/// Burst plus sustained limits for one connection.
#[derive(Debug)]
pub struct RateLimiter {
    burst: Window,
    sustained: Window,
}

impl RateLimiter {
    /// # Example
    ///
    /// ```
    /// use bj_server::api::rate_limiter::{RateLimited, RateLimiter};
    /// use std::time::Duration;
    ///
    /// let mut limiter = RateLimiter::new((2, Duration::from_secs(1)), (100, Duration::from_secs(60)));
    /// assert!(limiter.check().is_ok());
    /// assert!(limiter.check().is_ok());
    /// assert_eq!(limiter.check(), Err(RateLimited::Burst));
    /// ```
    pub fn new(burst: (usize, Duration), sustained: (usize, Duration)) -> Self {
        Self {
            burst: Window::new(burst.0, burst.1),
            sustained: Window::new(sustained.0, sustained.1),
        }
    }

    /// 10 messages per second, 100 per minute.
    pub fn for_websocket() -> Self {
        Self::new((10, Duration::from_secs(1)), (100, Duration::from_secs(60)))
    }

    /// Records the message if both windows have room for it.
    ///
    /// A refused message is not recorded, so it doesn't extend the penalty.
    pub fn check(&mut self) -> Result<(), RateLimited> {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> Result<(), RateLimited> {
        self.burst.expire(now);
        self.sustained.expire(now);

        if self.burst.is_full() {
            return Err(RateLimited::Burst);
        }
        if self.sustained.is_full() {
            return Err(RateLimited::Sustained);
        }

        self.burst.hits.push_back(now);
        self.sustained.hits.push_back(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::for_websocket()
    }
}
