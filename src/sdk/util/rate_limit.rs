use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type Limiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

fn per_minute(requests: u32) -> Limiter {
    let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(burst)))
}

/// Public OSRM demo server fair-use limit.
pub fn osrm_limiter() -> Limiter {
    per_minute(60)
}

/// Free-tier Gemini request budget.
pub fn llm_limiter() -> Limiter {
    per_minute(15)
}
