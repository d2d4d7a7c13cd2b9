//! Role-aware dashboard summary.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, AuthBackend};
use crate::db::{Database, TaskCounts, UserRole};
use crate::impl_has_auth_backend;

#[derive(Clone)]
pub struct DashboardState {
    pub db: Database,
    pub auth: AuthBackend,
}

impl_has_auth_backend!(DashboardState);

pub fn router(state: DashboardState) -> Router {
    Router::new().route("/", get(get_dashboard)).with_state(state)
}

#[derive(Serialize)]
struct DashboardResponse {
    role: UserRole,
    /// Only reported to superadmins.
    #[serde(skip_serializing_if = "Option::is_none")]
    admins: Option<i64>,
    users: i64,
    tasks: TaskCounts,
}

async fn get_dashboard(
    State(state): State<DashboardState>,
    auth: Auth<AdminOnly>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let role = auth.user.user.role;
    let users = state.db.users();

    let admins = if role.is_at_least(UserRole::Superadmin) {
        Some(
            users
                .count_by_role(UserRole::Admin)
                .await
                .db_err("Failed to count admins")?,
        )
    } else {
        None
    };

    let user_count = users
        .count_by_role(UserRole::User)
        .await
        .db_err("Failed to count users")?;

    let tasks = state
        .db
        .tasks()
        .count_by_status()
        .await
        .db_err("Failed to count tasks")?;

    Ok(Json(DashboardResponse {
        role,
        admins,
        users: user_count,
        tasks,
    }))
}
