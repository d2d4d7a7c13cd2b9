//! Shared authentication state.

use std::sync::Arc;

use super::authenticator::Authenticator;
use super::cookie::CookieSettings;
use super::credentials::HeaderThenCookie;
use crate::db::Database;
use crate::jwt::JwtConfig;

/// Everything the auth extractors and session handlers need.
///
/// Built once at startup and cloned into each router state.
#[derive(Clone)]
pub struct AuthBackend {
    pub jwt: Arc<JwtConfig>,
    pub cookies: Arc<CookieSettings>,
    pub authenticator: Arc<Authenticator>,
    /// Issue a fresh refresh token on every refresh.
    pub rotate_refresh_tokens: bool,
}

impl AuthBackend {
    pub fn new(
        jwt: Arc<JwtConfig>,
        cookies: CookieSettings,
        db: Database,
        rotate_refresh_tokens: bool,
    ) -> Self {
        let extractor = HeaderThenCookie::new(cookies.access_name.clone());
        let authenticator = Authenticator::new(extractor, jwt.clone(), db);
        Self {
            jwt,
            cookies: Arc::new(cookies),
            authenticator: Arc::new(authenticator),
            rotate_refresh_tokens,
        }
    }
}

/// Trait for router states that can authenticate requests.
pub trait HasAuthBackend {
    fn auth(&self) -> &AuthBackend;
}

/// Implement `HasAuthBackend` for a state struct with an `auth: AuthBackend` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub auth: AuthBackend,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn auth(&self) -> &$crate::auth::AuthBackend {
                &self.auth
            }
        }
    };
}
