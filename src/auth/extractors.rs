//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::UserRole;

/// Minimum role an `Auth` extractor requires.
pub trait RoleConstraint: Send + Sync + 'static {
    const MIN_ROLE: UserRole;
}

/// Any authenticated principal.
pub struct AnyRole;

/// Admins and superadmins.
pub struct AdminOnly;

/// Superadmins only.
pub struct SuperadminOnly;

impl RoleConstraint for AnyRole {
    const MIN_ROLE: UserRole = UserRole::User;
}

impl RoleConstraint for AdminOnly {
    const MIN_ROLE: UserRole = UserRole::Admin;
}

impl RoleConstraint for SuperadminOnly {
    const MIN_ROLE: UserRole = UserRole::Superadmin;
}

/// Extractor for endpoints that require an authenticated principal with at
/// least the role named by `R`.
///
/// Returns JSON errors: 401 for missing or invalid credentials, 403 when the
/// role is too low.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub user: AuthenticatedUser,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = state
            .auth()
            .authenticator
            .authenticate(&parts.headers)
            .await?;

        if !user.user.role.is_at_least(R::MIN_ROLE) {
            tracing::warn!(
                user = %user.user.uuid,
                role = %user.user.role,
                required = %R::MIN_ROLE,
                "Insufficient role"
            );
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            user,
            _role: PhantomData,
        })
    }
}

/// Optional authentication extractor - never fails, returns Option<AuthenticatedUser>.
/// Any authentication failure reads as anonymous.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            state
                .auth()
                .authenticator
                .authenticate(&parts.headers)
                .await
                .ok(),
        ))
    }
}
