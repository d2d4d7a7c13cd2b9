//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Default login attempts allowed per client IP per minute.
pub const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

/// Bucket shared by every request whose client IP cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for the login endpoint.
pub struct RateLimitConfig {
    pub login: IpLimiter,
    /// Key on `X-Forwarded-For` instead of the socket address.
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    pub fn new(login_attempts_per_minute: NonZeroU32, trust_proxy: bool) -> Self {
        Self {
            login: RateLimiter::keyed(Quota::per_minute(login_attempts_per_minute)),
            trust_proxy,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(
            NonZeroU32::new(DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN),
            false,
        )
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = extract_client_ip(&request, config.trust_proxy)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    match config.login.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(client = %key, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": "Too many requests" })),
            )
                .into_response()
        }
    }
}
