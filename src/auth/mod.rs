//! JWT authentication with role-based access control.
//!
//! Short-lived access tokens authenticate requests; long-lived refresh tokens
//! mint new ones. Both are stateless. Clients present the access token either
//! as `Authorization: Bearer <token>` or in the `access` cookie, with the
//! header taking precedence.

mod authenticator;
mod cookie;
mod credentials;
mod errors;
mod extractors;
mod ip;
mod password;
mod state;
mod types;

pub use authenticator::{AuthError, Authenticator, PrincipalResolver, TokenValidator};
pub use cookie::{
    ACCESS_COOKIE_NAME, CookieSettings, LOGGED_IN_COOKIE_NAME, REFRESH_COOKIE_NAME, SameSite,
    clear_auth_cookies, get_cookie, write_auth_cookies,
};
pub use credentials::{CredentialExtractor, CredentialSource, HeaderThenCookie, RawCredential};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, OptionalAuth, RoleConstraint, SuperadminOnly};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use password::{
    PasswordError, dummy_hash, hash_password, spawn_hash, spawn_verify, verify_password,
};
pub use state::{AuthBackend, HasAuthBackend};
pub use types::AuthenticatedUser;
