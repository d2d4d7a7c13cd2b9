//! Dual-source request authentication.
//!
//! The authenticator is composed from three capabilities: a
//! [`CredentialExtractor`] that finds the raw token, a [`TokenValidator`]
//! that checks it, and a [`PrincipalResolver`] that turns the token's
//! subject into a live account.

use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{error, warn};

use super::credentials::{CredentialExtractor, HeaderThenCookie, RawCredential};
use super::types::AuthenticatedUser;
use crate::db::{Database, User};
use crate::jwt::{Claims, JwtConfig, TokenError, TokenKind};

/// Checks a raw token string.
pub trait TokenValidator: Send + Sync {
    fn validate_token(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError>;
}

impl TokenValidator for JwtConfig {
    fn validate_token(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        self.validate(token, expected)
    }
}

impl<T: TokenValidator + ?Sized> TokenValidator for Arc<T> {
    fn validate_token(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        (**self).validate_token(token, expected)
    }
}

/// Looks up the account a token refers to.
pub trait PrincipalResolver: Send + Sync {
    type Error: std::fmt::Display + Send;

    fn resolve(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send;
}

impl PrincipalResolver for Database {
    type Error = sqlx::Error;

    fn resolve(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send {
        async move { self.users().get_by_uuid(uuid).await }
    }
}

/// Why a request could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Neither the header nor the cookie carried a token.
    NoCredentialPresent,
    /// A token was presented but rejected.
    Token(TokenError),
    /// The token is valid but its principal no longer exists.
    PrincipalNotFound,
    /// The token is valid but its principal has been blocked.
    PrincipalInactive,
    /// The principal lookup itself failed.
    Lookup,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NoCredentialPresent => write!(f, "No credentials provided"),
            AuthError::Token(e) => write!(f, "{}", e),
            AuthError::PrincipalNotFound => write!(f, "User not found"),
            AuthError::PrincipalInactive => write!(f, "User is inactive"),
            AuthError::Lookup => write!(f, "User lookup failed"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Authenticates requests from the `Authorization` header, falling back to a cookie.
pub struct Authenticator<E = HeaderThenCookie, V = Arc<JwtConfig>, R = Database> {
    extractor: E,
    validator: V,
    resolver: R,
}

impl<E, V, R> Authenticator<E, V, R>
where
    E: CredentialExtractor,
    V: TokenValidator,
    R: PrincipalResolver,
{
    pub fn new(extractor: E, validator: V, resolver: R) -> Self {
        Self {
            extractor,
            validator,
            resolver,
        }
    }

    /// Authenticate a request from its headers.
    ///
    /// A present `Authorization` header is always used, and its failure is
    /// final: the cookie is only consulted when the header is absent.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        let credential = self
            .extractor
            .extract(headers)
            .map_err(|e| {
                warn!(source = "header", reason = e.reason(), "Rejected authorization header");
                AuthError::Token(e)
            })?
            .ok_or(AuthError::NoCredentialPresent)?;

        self.verify(credential, TokenKind::Access).await
    }

    /// Validate a raw credential of the expected kind and resolve its principal.
    pub async fn verify(
        &self,
        credential: RawCredential<'_>,
        expected: TokenKind,
    ) -> Result<AuthenticatedUser, AuthError> {
        let claims = self
            .validator
            .validate_token(credential.token, expected)
            .map_err(|e| {
                warn!(
                    source = credential.source.as_str(),
                    kind = %expected,
                    reason = e.reason(),
                    "Token validation failed"
                );
                AuthError::Token(e)
            })?;

        let user = self
            .resolver
            .resolve(&claims.sub)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up principal");
                AuthError::Lookup
            })?
            .ok_or_else(|| {
                warn!(user = %claims.sub, "Token references a missing user");
                AuthError::PrincipalNotFound
            })?;

        if !user.active {
            warn!(user = %claims.sub, "Token presented for an inactive user");
            return Err(AuthError::PrincipalInactive);
        }

        Ok(AuthenticatedUser { user, claims })
    }
}
