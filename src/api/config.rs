//! Public configuration endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::auth::{AuthBackend, OptionalAuth};
use crate::db::UserRole;
use crate::impl_has_auth_backend;

/// Version embedded at compile time from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct ConfigState {
    pub auth: AuthBackend,
}

impl_has_auth_backend!(ConfigState);

#[derive(Serialize)]
struct ConfigResponse {
    version: &'static str,
    authenticated: bool,
    role: Option<UserRole>,
}

pub fn router(state: ConfigState) -> Router {
    Router::new().route("/", get(get_config)).with_state(state)
}

async fn get_config(
    State(_state): State<ConfigState>,
    OptionalAuth(user): OptionalAuth,
) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        version: VERSION,
        authenticated: user.is_some(),
        role: user.map(|u| u.user.role),
    })
}
