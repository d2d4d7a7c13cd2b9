//! Task API endpoints.
//!
//! - GET `/` - List all tasks (admin+)
//! - POST `/` - Create a task (admin+)
//! - PUT `/{id}` - Edit a task (admin+)
//! - GET `/{id}/report` - Completion report of a finished task (admin+)
//! - GET `/mine` - Tasks assigned to the caller
//! - PATCH `/{id}/status` - Status update by the assignee

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, Auth, AuthBackend};
use crate::db::{Database, StatusUpdate, Task, TaskFields, TaskStatus, UserRole};
use crate::impl_has_auth_backend;

const MAX_TITLE_LENGTH: usize = 200;
const COMPLETION_REQUIREMENTS: &str =
    "Completion report and worked hours are required when marking task as completed.";

#[derive(Clone)]
pub struct TasksState {
    pub db: Database,
    pub auth: AuthBackend,
}

impl_has_auth_backend!(TasksState);

pub fn router(state: TasksState) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/mine", get(my_tasks))
        .route("/{id}", put(update_task))
        .route("/{id}/report", get(task_report))
        .route("/{id}/status", patch(update_status))
        .with_state(state)
}

/// Parse a `YYYY-MM-DD` due date. Only the zero-padded form is accepted.
fn parse_due_date(date: &str) -> Option<NaiveDate> {
    if date.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[derive(Deserialize)]
struct TaskRequest {
    title: String,
    description: String,
    /// UUID of the assignee.
    assigned_to: String,
    due_date: String,
    /// Ignored on creation: new tasks always start pending.
    status: Option<TaskStatus>,
}

struct ValidatedTask<'a> {
    title: &'a str,
    description: &'a str,
    due_date: NaiveDate,
    assignee_id: i64,
}

/// Validate a create/edit request and resolve its assignee.
async fn validate_task<'a>(
    state: &TasksState,
    payload: &'a TaskRequest,
) -> Result<ValidatedTask<'a>, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Title cannot be longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    let due_date = parse_due_date(payload.due_date.trim())
        .ok_or_else(|| ApiError::bad_request("Due date must be a YYYY-MM-DD date"))?;

    let assigned_to = payload.assigned_to.trim();
    validate_uuid(assigned_to)?;
    let assignee = state
        .db
        .users()
        .get_by_uuid(assigned_to)
        .await
        .db_err("Failed to look up assignee")?
        .filter(|user| user.role == UserRole::User)
        .ok_or_else(|| ApiError::bad_request("Assignee must be an existing user"))?;

    Ok(ValidatedTask {
        title,
        description: payload.description.trim(),
        due_date,
        assignee_id: assignee.id,
    })
}

async fn load_task(state: &TasksState, id: i64) -> Result<Task, ApiError> {
    state
        .db
        .tasks()
        .get(id)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

async fn list_tasks(
    State(state): State<TasksState>,
    _auth: Auth<AdminOnly>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .db
        .tasks()
        .list_all()
        .await
        .db_err("Failed to list tasks")?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<TasksState>,
    auth: Auth<AdminOnly>,
    Json(payload): Json<TaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = validate_task(&state, &payload).await?;

    let id = state
        .db
        .tasks()
        .create(
            &TaskFields {
                title: task.title,
                description: task.description,
                assigned_to_id: task.assignee_id,
                due_date: task.due_date,
                status: TaskStatus::Pending,
            },
            auth.user.user.id,
        )
        .await
        .db_err("Failed to create task")?;

    info!(task = id, by = %auth.user.user.uuid, "Task created");

    let task = load_task(&state, id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<TasksState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<i64>,
    Json(payload): Json<TaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let existing = load_task(&state, id).await?;
    let task = validate_task(&state, &payload).await?;

    let updated = state
        .db
        .tasks()
        .update(
            id,
            &TaskFields {
                title: task.title,
                description: task.description,
                assigned_to_id: task.assignee_id,
                due_date: task.due_date,
                status: payload.status.unwrap_or(existing.status),
            },
        )
        .await
        .db_err("Failed to update task")?;
    if !updated {
        return Err(ApiError::not_found("Task not found"));
    }

    info!(task = id, by = %auth.user.user.uuid, "Task updated");

    Ok(Json(load_task(&state, id).await?))
}

#[derive(Serialize)]
struct TaskReport {
    id: i64,
    title: String,
    assigned_to: String,
    completion_report: Option<String>,
    worked_hours: Option<f64>,
}

async fn task_report(
    State(state): State<TasksState>,
    _auth: Auth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<Json<TaskReport>, ApiError> {
    let task = load_task(&state, id).await?;

    if task.status != TaskStatus::Completed {
        return Err(ApiError::bad_request("Task not completed"));
    }

    Ok(Json(TaskReport {
        id: task.id,
        title: task.title,
        assigned_to: task.assigned_to,
        completion_report: task.completion_report,
        worked_hours: task.worked_hours,
    }))
}

async fn my_tasks(
    State(state): State<TasksState>,
    auth: Auth,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .db
        .tasks()
        .list_for_user(auth.user.user.id)
        .await
        .db_err("Failed to list tasks")?;
    Ok(Json(tasks))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: TaskStatus,
    completion_report: Option<String>,
    worked_hours: Option<f64>,
}

/// Check a status update. Completion needs a report and a positive number of hours.
fn validate_status(request: &StatusRequest) -> Result<StatusUpdate<'_>, ApiError> {
    let completion_report = request
        .completion_report
        .as_deref()
        .map(str::trim)
        .filter(|report| !report.is_empty());

    if let Some(hours) = request.worked_hours {
        if !hours.is_finite() || hours < 0.0 {
            return Err(ApiError::bad_request("Worked hours must be a positive number"));
        }
    }

    if request.status == TaskStatus::Completed {
        let has_hours = request.worked_hours.is_some_and(|hours| hours > 0.0);
        if completion_report.is_none() || !has_hours {
            return Err(ApiError::bad_request(COMPLETION_REQUIREMENTS));
        }
    }

    Ok(StatusUpdate {
        status: request.status,
        completion_report,
        worked_hours: request.worked_hours,
    })
}

async fn update_status(
    State(state): State<TasksState>,
    auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Task>, ApiError> {
    let update = validate_status(&payload)?;

    // Tasks assigned to someone else look the same as missing ones.
    let updated = state
        .db
        .tasks()
        .update_status(id, auth.user.user.id, &update)
        .await
        .db_err("Failed to update task status")?;
    if !updated {
        return Err(ApiError::not_found("Task not found"));
    }

    info!(task = id, status = update.status.as_str(), user = %auth.user.user.uuid, "Task status updated");

    Ok(Json(load_task(&state, id).await?))
}
