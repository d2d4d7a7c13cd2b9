//! Session API endpoints.
//!
//! - POST `/login` - Check credentials and set the auth cookies
//! - POST `/refresh` - Exchange a refresh token for new tokens
//! - POST `/logout` - Delete the auth cookies
//!
//! Tokens only ever travel in `Set-Cookie` headers, never in response bodies.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    AuthBackend, AuthError, CredentialSource, OptionalAuth, REFRESH_COOKIE_NAME, RawCredential,
    clear_auth_cookies, get_cookie, spawn_verify, write_auth_cookies,
};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::{IssuedToken, JwtError, TokenError, TokenKind};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";
const LOGIN_FAILED: &str = "Login Failed";
const REFRESH_FAILED: &str = "Token refresh failed.";

#[derive(Clone)]
pub struct SessionState {
    pub db: Database,
    pub auth: AuthBackend,
    pub rate_limit: Arc<RateLimitConfig>,
    /// Verified against when the account does not exist.
    pub dummy_hash: Arc<str>,
}

impl_has_auth_backend!(SessionState);

pub fn router(state: SessionState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(login_router)
}

/// Errors from the session flows.
#[derive(Debug)]
pub enum SessionError {
    Api(ApiError),
    /// Credentials checked out but the issuer produced no tokens.
    /// Carries the message shown to the client.
    MissingTokenInIssuedResponse(&'static str),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        SessionError::Api(err)
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        match self {
            SessionError::Api(err) => err.into_response(),
            SessionError::MissingTokenInIssuedResponse(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": message })),
            )
                .into_response(),
        }
    }
}

fn issuer_failure(e: JwtError, message: &'static str) -> SessionError {
    error!(error = %e, "Token issuer failed");
    SessionError::MissingTokenInIssuedResponse(message)
}

/// 200 with a JSON body and the session cookies attached.
fn with_cookies(
    auth: &AuthBackend,
    body: serde_json::Value,
    access: &IssuedToken,
    refresh: Option<&IssuedToken>,
) -> Response {
    let mut response = (StatusCode::OK, Json(body)).into_response();
    write_auth_cookies(response.headers_mut(), &auth.cookies, access, refresh);
    response
}

#[derive(Deserialize)]
struct LoginRequest {
    /// Username or email.
    username: String,
    password: String,
}

async fn login(
    State(state): State<SessionState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, SessionError> {
    let login = payload.username.trim();

    let Some((user, password_hash)) = state
        .db
        .users()
        .get_login(login)
        .await
        .db_err("Failed to look up login")?
    else {
        spawn_verify(payload.password, state.dummy_hash.to_string()).await;
        warn!("Login failed: unknown account");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS).into());
    };

    if !spawn_verify(payload.password, password_hash).await {
        warn!(user = %user.uuid, "Login failed: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS).into());
    }

    if !user.active {
        warn!(user = %user.uuid, "Login refused for inactive account");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS).into());
    }

    let pair = state
        .auth
        .jwt
        .issue_pair(&user.uuid)
        .map_err(|e| issuer_failure(e, LOGIN_FAILED))?;

    info!(user = %user.uuid, role = %user.role, "User logged in");

    Ok(with_cookies(
        &state.auth,
        serde_json::json!({ "message": "Login Successful.", "role": user.role }),
        &pair.access,
        Some(&pair.refresh),
    ))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh: Option<String>,
}

/// Read `{"refresh": "..."}` from a body that may be empty or not JSON at all.
fn refresh_token_from_body(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<RefreshRequest>(body)
        .ok()?
        .refresh
        .filter(|token| !token.is_empty())
}

fn refresh_failure_message(err: &AuthError) -> &'static str {
    match err {
        AuthError::Token(TokenError::Expired) => "Token is expired",
        AuthError::Token(TokenError::WrongKind { .. }) => "Token has wrong type",
        AuthError::Token(_) => "Token is invalid",
        AuthError::PrincipalNotFound => "User not found",
        AuthError::PrincipalInactive => "User is inactive",
        AuthError::NoCredentialPresent => "No refresh token provided",
        AuthError::Lookup => "Database error",
    }
}

/// Exchange a refresh token for a new access token (and, with rotation, a new
/// refresh token). The `refresh` cookie takes precedence over the body.
///
/// Failures never set cookies.
async fn refresh(
    State(state): State<SessionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, SessionError> {
    let body_token;
    let credential = match get_cookie(&headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty()) {
        Some(token) => RawCredential {
            token,
            source: CredentialSource::Cookie,
        },
        None => {
            body_token = refresh_token_from_body(&body)
                .ok_or_else(|| ApiError::bad_request("No refresh token provided"))?;
            RawCredential {
                token: &body_token,
                source: CredentialSource::Body,
            }
        }
    };

    let principal = state
        .auth
        .authenticator
        .verify(credential, TokenKind::Refresh)
        .await
        .map_err(|e| match e {
            AuthError::Lookup => ApiError::internal("Database error"),
            other => ApiError::unauthorized(refresh_failure_message(&other)),
        })?;

    let uuid = &principal.user.uuid;
    let (access, refresh) = if state.auth.rotate_refresh_tokens {
        let pair = state
            .auth
            .jwt
            .issue_pair(uuid)
            .map_err(|e| issuer_failure(e, REFRESH_FAILED))?;
        (pair.access, Some(pair.refresh))
    } else {
        let access = state
            .auth
            .jwt
            .issue_access(uuid)
            .map_err(|e| issuer_failure(e, REFRESH_FAILED))?;
        (access, None)
    };

    info!(user = %uuid, rotated = refresh.is_some(), "Tokens refreshed");

    Ok(with_cookies(
        &state.auth,
        serde_json::json!({ "message": "Access tokens refreshed successfully" }),
        &access,
        refresh.as_ref(),
    ))
}

/// Delete the auth cookies. Always succeeds, with or without a session.
///
/// Tokens themselves stay valid until they expire.
async fn logout(State(state): State<SessionState>, OptionalAuth(user): OptionalAuth) -> Response {
    match user {
        Some(user) => info!(user = %user.user.uuid, "User logged out"),
        None => info!("Logout without an active session"),
    }

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Logged out successfully." })),
    )
        .into_response();
    clear_auth_cookies(response.headers_mut(), &state.auth.cookies);
    response
}
