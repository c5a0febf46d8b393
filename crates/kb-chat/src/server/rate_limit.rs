//! Per-client rate limiting for chat routes

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;

use super::state::AppState;

/// Prune idle keys after this many checks
const PRUNE_EVERY: u64 = 1024;

/// Keyed by client IP
pub struct ChatRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    trust_forwarded: bool,
    checks: AtomicU64,
}

impl ChatRateLimiter {
    /// `trust_forwarded` keys on `X-Forwarded-For`; only set it behind a
    /// proxy that overwrites the header
    pub fn new(requests_per_minute: u32, trust_forwarded: bool) -> Self {
        let burst = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(burst)),
            trust_forwarded,
            checks: AtomicU64::new(0),
        }
    }

    /// `true` if the request may proceed
    pub fn check(&self, client: IpAddr) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
        }
        self.limiter.check_key(&client).is_ok()
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Socket peer, or the first `X-Forwarded-For` hop when proxies are trusted
    pub fn client_ip(&self, request: &Request) -> IpAddr {
        let forwarded = if self.trust_forwarded {
            forwarded_for(request)
        } else {
            None
        };

        forwarded
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

fn forwarded_for(request: &Request) -> Option<IpAddr> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
}

pub async fn chat_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let limiter = state.chat_limiter();
    let client = limiter.client_ip(&request);
    if !limiter.check(client) {
        tracing::warn!(%client, "Chat rate limit exceeded");
        return Err(Error::RateLimited);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request {
        let mut builder = Request::builder();
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_limit_is_per_client() {
        let limiter = ChatRateLimiter::new(2, false);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a));
        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_forwarded_header_ignored_by_default() {
        let limiter = ChatRateLimiter::new(2, false);
        let peer: IpAddr = "192.0.2.10".parse().unwrap();

        for i in 0..5 {
            let request = request_from("192.0.2.10", Some(&format!("198.51.100.{}", i)));
            assert_eq!(limiter.client_ip(&request), peer);
        }

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(limiter.client_ip(&bare), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_forwarded_header_used_behind_trusted_proxy() {
        let limiter = ChatRateLimiter::new(2, true);

        let request = request_from("10.0.0.1", Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(limiter.client_ip(&request), "203.0.113.7".parse::<IpAddr>().unwrap());

        let garbled = request_from("10.0.0.1", Some("not-an-ip"));
        assert_eq!(limiter.client_ip(&garbled), "10.0.0.1".parse::<IpAddr>().unwrap());
    }
}
