//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Input rate limiter for UI WebSocket messages (per client)
pub const UI_INPUT_RATE_LIMIT: u32 = 30;

/// Panel action rate limit (per TCP connection)
pub const PANEL_ACTION_RATE_LIMIT: u32 = 20;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn ui() -> Self {
        Self {
            limiter: create_limiter(UI_INPUT_RATE_LIMIT),
        }
    }

    pub fn panel() -> Self {
        Self {
            limiter: create_limiter(PANEL_ACTION_RATE_LIMIT),
        }
    }

    /// Check if a message is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
