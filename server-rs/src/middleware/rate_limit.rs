use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::cache::Cache;
use crate::error::AppError;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Fixed-window limiter shared by every operation that calls out to Steam.
///
/// Counters live either in process memory or in Redis. Both backends count
/// the hit before deciding, so the first call of a window reports
/// `max_requests - 1` remaining and the call after the last admitted one is
/// denied until the window rolls over.
#[derive(Clone)]
pub struct RateLimiter {
    backend: Backend,
    max_requests: u32,
    window_secs: u64,
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<Mutex<HashMap<String, WindowEntry>>>),
    Redis(Cache),
}

struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
            max_requests,
            window_secs,
        }
    }

    pub fn with_redis(cache: Cache, max_requests: u32, window_secs: u64) -> Self {
        Self {
            backend: Backend::Redis(cache),
            max_requests,
            window_secs,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub async fn check(&self, caller: &CallerIdentity) -> RateLimitDecision {
        let key = format!("ratelimit:{}", caller.as_str());
        let count = match &self.backend {
            Backend::Memory(windows) => {
                let now = Instant::now();
                let mut windows = windows.lock().await;
                let entry = windows.entry(key).or_insert(WindowEntry {
                    count: 0,
                    reset_at: now + Duration::from_secs(self.window_secs),
                });

                if now >= entry.reset_at {
                    entry.count = 0;
                    entry.reset_at = now + Duration::from_secs(self.window_secs);
                }

                entry.count = entry.count.saturating_add(1);
                u64::from(entry.count)
            }
            Backend::Redis(cache) => match cache.hit_window(&key, self.window_secs).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(ip = %caller, error = %e, "Rate limit store unavailable, allowing request");
                    return RateLimitDecision {
                        allowed: true,
                        remaining: self.max_requests,
                    };
                }
            },
        };

        if count > u64::from(self.max_requests) {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
            }
        } else {
            RateLimitDecision {
                allowed: true,
                remaining: self.max_requests - count as u32,
            }
        }
    }

    /// Runs `check` and turns a deny into `AppError::RateLimited`.
    pub async fn enforce(&self, caller: &CallerIdentity) -> Result<RateLimitDecision, AppError> {
        let decision = self.check(caller).await;
        if !decision.allowed {
            return Err(AppError::RateLimited {
                limit: self.max_requests,
                retry_after_secs: self.window_secs,
            });
        }
        Ok(decision)
    }

    /// Drops in-memory windows that have already rolled over. Redis expires
    /// its own keys.
    pub async fn purge_expired(&self) -> usize {
        match &self.backend {
            Backend::Memory(windows) => {
                let now = Instant::now();
                let mut windows = windows.lock().await;
                let before = windows.len();
                windows.retain(|_, entry| entry.reset_at > now);
                before - windows.len()
            }
            Backend::Redis(_) => 0,
        }
    }
}

/// Network identity a request is rate limited under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(ip: impl Into<String>) -> Self {
        Self(ip.into())
    }

    /// Peer address first, then the first hop of `x-forwarded-for`.
    pub fn resolve(peer: Option<SocketAddr>, headers: &HeaderMap) -> Self {
        if let Some(addr) = peer {
            return Self(addr.ip().to_string());
        }
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_else(|| Self("unknown".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::resolve(peer, &parts.headers))
    }
}
