mod config;
mod dashboard;
mod error;
mod session;
mod tasks;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::{AuthBackend, dummy_hash};
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;
pub use session::SessionError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    auth: AuthBackend,
    rate_limit: Arc<RateLimitConfig>,
    bcrypt_cost: u32,
) -> Router {
    let session_state = session::SessionState {
        db: db.clone(),
        auth: auth.clone(),
        rate_limit,
        dummy_hash: Arc::from(dummy_hash(bcrypt_cost)),
    };

    let users_state = users::UsersState {
        db: db.clone(),
        auth: auth.clone(),
        bcrypt_cost,
    };

    let tasks_state = tasks::TasksState {
        db: db.clone(),
        auth: auth.clone(),
    };

    let dashboard_state = dashboard::DashboardState {
        db,
        auth: auth.clone(),
    };

    let config_state = config::ConfigState { auth };

    Router::new()
        .nest("/auth", session::router(session_state))
        .nest("/users", users::router(users_state))
        .nest("/tasks", tasks::router(tasks_state))
        .nest("/dashboard", dashboard::router(dashboard_state))
        .nest("/config", config::router(config_state))
}
