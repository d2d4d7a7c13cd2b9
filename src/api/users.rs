//! User administration API endpoints.
//!
//! - GET `/me` - The current principal
//! - GET `/?role=` - List accounts by role (admin+, admins only see users)
//! - POST `/` - Register an account (superadmin)
//! - POST `/{uuid}/block` - Toggle the active flag (superadmin)
//! - PUT `/{uuid}/role` - Change role between user and admin (superadmin)
//! - DELETE `/{uuid}` - Delete an account (superadmin)

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, Auth, AuthBackend, SuperadminOnly, spawn_hash};
use crate::db::{Database, NewUser, User, UserRole};
use crate::impl_has_auth_backend;

const MAX_USERNAME_LENGTH: usize = 150;
const MAX_MOBILE_LENGTH: usize = 15;
const MAX_NAME_LENGTH: usize = 255;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub auth: AuthBackend,
    pub bcrypt_cost: u32,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(me))
        .route("/{uuid}", delete(delete_user))
        .route("/{uuid}/block", post(toggle_block))
        .route("/{uuid}/role", put(update_role))
        .with_state(state)
}

async fn me(auth: Auth) -> Json<User> {
    Json(auth.user.user)
}

#[derive(Deserialize)]
struct ListQuery {
    role: Option<String>,
}

async fn list_users(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let role = match query.role.as_deref() {
        None => UserRole::User,
        Some(name) => UserRole::parse(name).ok_or_else(|| ApiError::bad_request("Invalid role"))?,
    };

    if role != UserRole::User && !auth.user.user.role.is_at_least(UserRole::Superadmin) {
        return Err(ApiError::forbidden("Admins can only list users"));
    }

    let users = state
        .db
        .users()
        .list_by_role(role)
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

#[derive(Deserialize)]
struct CreateUserRequest {
    name: String,
    email: String,
    username: String,
    mobile: String,
    password: String,
    re_password: String,
    role: String,
    assigned_admin: Option<String>,
}

fn valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '@' | '+' | '_' | '-')
}

/// Trimmed copy of a required field, or a 400 naming it.
fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(value)
}

async fn create_user(
    State(state): State<UsersState>,
    auth: Auth<SuperadminOnly>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = required(&payload.name, "Name")?;
    let email = required(&payload.email, "Email")?;
    let username = required(&payload.username, "Username")?;
    let mobile = required(&payload.mobile, "Mobile")?;

    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }
    if payload.password != payload.re_password {
        return Err(ApiError::bad_request("Passwords do not match."));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request("Name is too long"));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Username cannot be longer than {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username.chars().all(valid_username_char) {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and @/./+/-/_ characters",
        ));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ApiError::bad_request("Enter a valid email address"));
    }
    if mobile.len() > MAX_MOBILE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Mobile number cannot be longer than {} characters",
            MAX_MOBILE_LENGTH
        )));
    }

    // Superadmins only come from the command line.
    let role = match UserRole::parse(payload.role.trim()) {
        Some(role @ (UserRole::User | UserRole::Admin)) => role,
        _ => return Err(ApiError::bad_request("Invalid role")),
    };

    let assigned_admin = match payload.assigned_admin.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(_) if role != UserRole::User => {
            return Err(ApiError::bad_request(
                "Only users can be assigned to an admin",
            ));
        }
        Some(admin_uuid) => {
            validate_uuid(admin_uuid)?;
            let admin = state
                .db
                .users()
                .get_by_uuid(admin_uuid)
                .await
                .db_err("Failed to look up admin")?
                .filter(|admin| admin.role == UserRole::Admin)
                .ok_or_else(|| ApiError::bad_request("Assigned admin not found"))?;
            Some(admin.uuid)
        }
    };

    if let Some(conflict) = state
        .db
        .users()
        .find_conflict(username, email, mobile)
        .await
        .db_err("Failed to check for existing users")?
    {
        return Err(ApiError::conflict(conflict.message()));
    }

    let password_hash = spawn_hash(payload.password, state.bcrypt_cost)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create user: {}", e)))?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let id = state
        .db
        .users()
        .create(
            &NewUser {
                uuid: &uuid,
                name,
                email,
                username,
                mobile,
                role,
                assigned_admin: assigned_admin.as_deref(),
            },
            &password_hash,
        )
        .await
        .map_err(insert_error)?;

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to load created user")?
        .ok_or_else(|| ApiError::internal("Created user disappeared"))?;

    info!(
        user = %user.uuid,
        role = %user.role,
        by = %auth.user.user.uuid,
        "User registered"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// Map an insert failure. A concurrent registration that won the race for a
/// unique column surfaces as a constraint violation and reads as a conflict.
fn insert_error(e: sqlx::Error) -> ApiError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        ApiError::conflict("A user with this username, email or mobile already exists.")
    } else {
        ApiError::db_error("Failed to create user", e)
    }
}

/// Load the target of an administrative action, refusing to act on the caller.
async fn load_target(
    state: &UsersState,
    caller: &User,
    uuid: &str,
    self_message: &'static str,
) -> Result<User, ApiError> {
    validate_uuid(uuid)?;

    let user = state
        .db
        .users()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.id == caller.id {
        return Err(ApiError::bad_request(self_message));
    }
    if user.role == UserRole::Superadmin {
        return Err(ApiError::forbidden("Superadmin accounts cannot be modified"));
    }

    Ok(user)
}

#[derive(Serialize)]
struct BlockResponse {
    uuid: String,
    active: bool,
}

async fn toggle_block(
    State(state): State<UsersState>,
    auth: Auth<SuperadminOnly>,
    Path(uuid): Path<String>,
) -> Result<Json<BlockResponse>, ApiError> {
    let user = load_target(
        &state,
        &auth.user.user,
        &uuid,
        "You cannot block your own account.",
    )
    .await?;

    let active = state
        .db
        .users()
        .toggle_active(user.id)
        .await
        .db_err("Failed to update user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user = %user.uuid, active, "User block status changed");

    Ok(Json(BlockResponse {
        uuid: user.uuid,
        active,
    }))
}

#[derive(Deserialize)]
struct UpdateRoleRequest {
    role: String,
}

async fn update_role(
    State(state): State<UsersState>,
    auth: Auth<SuperadminOnly>,
    Path(uuid): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<User>, ApiError> {
    let role = match UserRole::parse(payload.role.trim()) {
        Some(role @ (UserRole::User | UserRole::Admin)) => role,
        _ => return Err(ApiError::bad_request("Invalid role")),
    };

    let user = load_target(
        &state,
        &auth.user.user,
        &uuid,
        "You cannot change your own role.",
    )
    .await?;

    let updated = state
        .db
        .users()
        .set_role(user.id, role)
        .await
        .db_err("Failed to update role")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %user.uuid, from = %user.role, to = %role, "User role changed");

    let user = state
        .db
        .users()
        .get_by_id(user.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user))
}

async fn delete_user(
    State(state): State<UsersState>,
    auth: Auth<SuperadminOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = load_target(
        &state,
        &auth.user.user,
        &uuid,
        "You cannot delete your own account.",
    )
    .await?;

    let deleted = state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %user.uuid, role = %user.role, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
