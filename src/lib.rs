pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod rate_limit;

use api::create_api_router;
use auth::{AuthBackend, CookieSettings};
use axum::Router;
use db::Database;
use jwt::{JwtConfig, TokenLifetimes};
use rate_limit::{DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE, RateLimitConfig};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Default bcrypt cost for new password hashes.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access and refresh token lifetimes
    pub lifetimes: TokenLifetimes,
    /// Attributes of the auth cookies
    pub cookies: CookieSettings,
    /// Issue a new refresh token on every refresh
    pub rotate_refresh_tokens: bool,
    /// Login attempts allowed per client IP per minute
    pub login_attempts_per_minute: NonZeroU32,
    /// Take the client IP from `X-Forwarded-For` (requires running behind a proxy)
    pub trust_proxy: bool,
    /// bcrypt cost for passwords set through the API
    pub bcrypt_cost: u32,
}

impl ServerConfig {
    /// Configuration with default lifetimes, cookie attributes and limits.
    pub fn new(db: Database, jwt_secret: Vec<u8>) -> Self {
        Self {
            db,
            jwt_secret,
            lifetimes: TokenLifetimes::default(),
            cookies: CookieSettings::default(),
            rotate_refresh_tokens: true,
            login_attempts_per_minute: NonZeroU32::new(DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE)
                .unwrap_or(NonZeroU32::MIN),
            trust_proxy: false,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret, config.lifetimes));

    let auth = AuthBackend::new(
        jwt,
        config.cookies.clone(),
        config.db.clone(),
        config.rotate_refresh_tokens,
    );

    let rate_limit = Arc::new(RateLimitConfig::new(
        config.login_attempts_per_minute,
        config.trust_proxy,
    ));

    let api_router = create_api_router(config.db.clone(), auth, rate_limit, config.bcrypt_cost);

    Router::new().nest("/api", api_router)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
