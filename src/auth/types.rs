//! Authentication user types.

use crate::db::User;
use crate::jwt::Claims;

/// A request principal resolved from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The account as currently stored, not as it was when the token was issued.
    pub user: User,
    /// Claims of the token that authenticated the request.
    pub claims: Claims,
}
