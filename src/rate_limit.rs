use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use thiserror::Error;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Error)]
#[error("rate limit exceeded: {max_requests} requests per {window_secs}s")]
pub struct RateLimitExceeded {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Keyed limiter shared by the protected route groups; the key is the peer
/// address, the quota approximates a fixed window of `max_requests` per
/// `window_secs`.
pub struct ApiRateLimiter {
    limiter: RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>,
    max_requests: u32,
    window_secs: u64,
}

impl ApiRateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        let max = NonZeroU32::new(max_requests.max(1)).unwrap_or(NonZeroU32::MIN);
        let period = Duration::from_secs(window_secs.max(1)) / max.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(max);

        Self {
            limiter: RateLimiter::keyed(quota),
            max_requests,
            window_secs,
        }
    }

    pub fn check(&self, addr: IpAddr) -> Result<(), RateLimitExceeded> {
        self.limiter.check_key(&addr).map_err(|_| RateLimitExceeded {
            max_requests: self.max_requests,
            window_secs: self.window_secs,
        })
    }
}

/// Middleware applied to the auth and contacts route groups; over-limit
/// requests never reach a handler.
pub async fn enforce(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(e) = state.limiter.check(addr.ip()) {
        warn!(peer = %addr, %e, "request rate limited");
        return (StatusCode::TOO_MANY_REQUESTS, e.to_string()).into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_then_rejects() {
        let limiter = ApiRateLimiter::new(10, 60);
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..10 {
            assert!(limiter.check(addr).is_ok());
        }
        let err = limiter.check(addr).unwrap_err();
        assert_eq!(err.max_requests, 10);
        assert_eq!(err.window_secs, 60);
    }

    #[test]
    fn keys_are_limited_independently() {
        let limiter = ApiRateLimiter::new(2, 60);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_err());
        assert!(limiter.check(b).is_ok());
    }
}
