//! Authentication error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::authenticator::AuthError;

/// Reason an extractor rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    InsufficientRole,
    DatabaseError,
}

/// API authentication error, rendered as `{"error": "..."}`.
///
/// Cookies are left untouched: a stale access cookie is harmless and the
/// refresh cookie must survive so the client can recover.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated | AuthErrorKind::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Authentication credentials were not provided.",
            AuthErrorKind::InvalidToken => "Invalid or expired token",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
            AuthErrorKind::DatabaseError => "Database error",
        }
    }
}

impl From<AuthError> for ApiAuthError {
    fn from(err: AuthError) -> Self {
        // Missing and blocked principals read the same as a bad token.
        let kind = match err {
            AuthError::NoCredentialPresent => AuthErrorKind::NotAuthenticated,
            AuthError::Token(_) | AuthError::PrincipalNotFound | AuthError::PrincipalInactive => {
                AuthErrorKind::InvalidToken
            }
            AuthError::Lookup => AuthErrorKind::DatabaseError,
        };
        Self::new(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
