use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use redis::AsyncCommands;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Action classes gated by the limiter, each with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitClass {
    Auth,
    Api,
    ForgotPassword,
    SensitiveAction,
}

impl RateLimitClass {
    pub fn label(&self) -> &'static str {
        match self {
            RateLimitClass::Auth => "auth",
            RateLimitClass::Api => "api",
            RateLimitClass::ForgotPassword => "forgotPassword",
            RateLimitClass::SensitiveAction => "sensitiveAction",
        }
    }

    /// (requests, window) budget per caller.
    pub fn budget(&self) -> (u32, Duration) {
        match self {
            RateLimitClass::Auth => (5, Duration::from_secs(60)),
            RateLimitClass::Api => (100, Duration::from_secs(60)),
            RateLimitClass::ForgotPassword => (3, Duration::from_secs(3600)),
            RateLimitClass::SensitiveAction => (10, Duration::from_secs(3600)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaExceeded {
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Duration,
    pub reset: Duration,
}

#[derive(Debug)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset: Duration,
}

#[derive(Clone)]
enum Backend {
    InMemory(Arc<DashMap<String, Vec<Instant>>>),
    Redis(redis::Client),
}

/// Sliding-window limiter. Redis-backed when a store is configured so limits
/// hold across instances; an in-process window log otherwise. A failing or
/// unreachable Redis never blocks traffic: the gate fails open.
#[derive(Clone)]
pub struct RateLimiter {
    backend: Backend,
}

impl RateLimiter {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::InMemory(Arc::new(DashMap::new())),
        }
    }

    pub fn redis(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            backend: Backend::Redis(client),
        })
    }

    pub fn from_config(redis_url: Option<&str>) -> Self {
        match redis_url {
            Some(url) => match Self::redis(url) {
                Ok(limiter) => {
                    tracing::info!("rate limiter using redis backend");
                    limiter
                }
                Err(err) => {
                    tracing::warn!(error = %err, "invalid REDIS_URL, rate limiter using in-memory backend");
                    Self::in_memory()
                }
            },
            None => {
                tracing::info!("rate limiter using in-memory backend");
                Self::in_memory()
            }
        }
    }

    pub async fn check(&self, class: RateLimitClass, caller: &str) -> RateLimitDecision {
        let (limit, window) = class.budget();
        let key = format!("ratelimit:{}:{}", class.label(), caller);

        match &self.backend {
            Backend::InMemory(entries) => check_in_memory(entries, &key, limit, window),
            Backend::Redis(client) => {
                match check_redis(client, &key, limit, window).await {
                    Ok(decision) => decision,
                    Err(err) => {
                        // Availability over strictness: let the request through.
                        tracing::warn!(error = %err, "rate limit store unavailable, failing open");
                        RateLimitDecision {
                            allowed: true,
                            limit,
                            remaining: limit,
                            reset: window,
                        }
                    }
                }
            }
        }
    }

    /// Gate used by handlers: `Err(RateLimited)` carries retry metadata.
    pub async fn enforce(&self, class: RateLimitClass, caller: &str) -> AppResult<()> {
        let decision = self.check(class, caller).await;
        if decision.allowed {
            return Ok(());
        }
        Err(AppError::RateLimited(QuotaExceeded {
            limit: decision.limit,
            remaining: decision.remaining,
            retry_after: decision.reset,
            reset: decision.reset,
        }))
    }
}

fn check_in_memory(
    entries: &DashMap<String, Vec<Instant>>,
    key: &str,
    limit: u32,
    window: Duration,
) -> RateLimitDecision {
    let now = Instant::now();
    let mut log = entries.entry(key.to_string()).or_default();
    log.retain(|hit| now.duration_since(*hit) < window);

    if log.len() >= limit as usize {
        // Quota frees up when the oldest hit leaves the window.
        let oldest = log.first().copied().unwrap_or(now);
        let reset = window.saturating_sub(now.duration_since(oldest));
        return RateLimitDecision {
            allowed: false,
            limit,
            remaining: 0,
            reset: reset.max(Duration::from_secs(1)),
        };
    }

    log.push(now);
    RateLimitDecision {
        allowed: true,
        limit,
        remaining: limit - log.len() as u32,
        reset: window,
    }
}

/// Two-bucket sliding window: the previous fixed window's count is weighted
/// by its remaining overlap, which bounds the burst a bucket rollover allows.
async fn check_redis(
    client: &redis::Client,
    key: &str,
    limit: u32,
    window: Duration,
) -> redis::RedisResult<RateLimitDecision> {
    let mut conn = client.get_async_connection().await?;

    let window_secs = window.as_secs().max(1);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let bucket = now / window_secs;
    let current_key = format!("{key}:{bucket}");
    let previous_key = format!("{key}:{}", bucket.wrapping_sub(1));

    let count: i64 = conn.incr(&current_key, 1).await?;
    if count == 1 {
        let _: () = conn.expire(&current_key, (window_secs * 2) as usize).await?;
    }
    let previous: Option<i64> = conn.get(&previous_key).await?;

    let elapsed = now % window_secs;
    let overlap = (window_secs - elapsed) as f64 / window_secs as f64;
    let weighted = previous.unwrap_or(0).max(0) as f64 * overlap + count as f64;

    let allowed = weighted <= f64::from(limit);
    let remaining = if allowed {
        (f64::from(limit) - weighted).floor().max(0.0) as u32
    } else {
        0
    };

    Ok(RateLimitDecision {
        allowed,
        limit,
        remaining,
        reset: Duration::from_secs(window_secs - elapsed),
    })
}

/// Blanket gate for the whole API surface under the `api` class; the
/// per-endpoint classes stack on top of it inside the handlers.
pub async fn gate_api(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.limiter.enforce(RateLimitClass::Api, &ip).await?;
    Ok(next.run(request).await)
}

/// Caller address used as the limiter key: proxy headers first, then the
/// socket peer address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts.headers.get("x-forwarded-for") {
            if let Ok(value) = forwarded.to_str() {
                if let Some(ip) = value.split(',').next() {
                    let ip = ip.trim();
                    if !ip.is_empty() {
                        return Ok(ClientIp(ip.to_string()));
                    }
                }
            }
        }

        if let Some(real_ip) = parts.headers.get("x-real-ip") {
            if let Ok(value) = real_ip.to_str() {
                return Ok(ClientIp(value.to_string()));
            }
        }

        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip().to_string()));
        }

        Ok(ClientIp("unknown".to_string()))
    }
}
