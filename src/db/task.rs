//! Task storage.
//!
//! Tasks reference users by internal id; the API only ever sees user UUIDs,
//! which are joined in on read.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// UUID of the assignee.
    pub assigned_to: String,
    /// UUID of the admin who created the task, if they still exist.
    pub created_by: Option<String>,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub completion_report: Option<String>,
    pub worked_hours: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: String,
    assigned_to: String,
    created_by: Option<String>,
    due_date: NaiveDate,
    status: String,
    completion_report: Option<String>,
    worked_hours: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            assigned_to: row.assigned_to,
            created_by: row.created_by,
            due_date: row.due_date,
            status: TaskStatus::parse(&row.status).unwrap_or(TaskStatus::Pending),
            completion_report: row.completion_report,
            worked_hours: row.worked_hours,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Editable task fields. Used for both creation and full edits.
#[derive(Debug, Clone)]
pub struct TaskFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub assigned_to_id: i64,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
}

/// Fields an assignee may change.
#[derive(Debug, Clone)]
pub struct StatusUpdate<'a> {
    pub status: TaskStatus,
    pub completion_report: Option<&'a str>,
    pub worked_hours: Option<f64>,
}

/// Number of tasks in each status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TaskCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

macro_rules! select_task {
    ($tail:literal) => {
        concat!(
            "SELECT t.id, t.title, t.description, u.uuid AS assigned_to, c.uuid AS created_by, \
             t.due_date, t.status, t.completion_report, t.worked_hours, t.created_at, t.updated_at \
             FROM tasks t JOIN users u ON u.id = t.assigned_to_id \
             LEFT JOIN users c ON c.id = t.created_by_id ",
            $tail
        )
    };
}

pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a task. Returns the task ID.
    pub async fn create(
        &self,
        fields: &TaskFields<'_>,
        created_by_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO tasks (title, description, assigned_to_id, created_by_id, due_date, status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.assigned_to_id)
        .bind(created_by_id)
        .bind(fields.due_date)
        .bind(fields.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Task>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as(select_task!("WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Task::from))
    }

    /// List every task, newest first.
    pub async fn list_all(&self) -> Result<Vec<Task>, sqlx::Error> {
        let rows: Vec<TaskRow> = sqlx::query_as(select_task!("ORDER BY t.id DESC"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    /// List tasks assigned to a user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Task>, sqlx::Error> {
        let rows: Vec<TaskRow> =
            sqlx::query_as(select_task!("WHERE t.assigned_to_id = ? ORDER BY t.id DESC"))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    /// Replace the editable fields of a task.
    pub async fn update(&self, id: i64, fields: &TaskFields<'_>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, assigned_to_id = ?, due_date = ?,
                    status = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.assigned_to_id)
        .bind(fields.due_date)
        .bind(fields.status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update status fields, but only if the task is assigned to `assignee_id`.
    pub async fn update_status(
        &self,
        id: i64,
        assignee_id: i64,
        update: &StatusUpdate<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, completion_report = ?, worked_hours = ?,
                    updated_at = datetime('now')
             WHERE id = ? AND assigned_to_id = ?",
        )
        .bind(update.status.as_str())
        .bind(update.completion_report)
        .bind(update.worked_hours)
        .bind(id)
        .bind(assignee_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count tasks per status.
    pub async fn count_by_status(&self) -> Result<TaskCounts, sqlx::Error> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = TaskCounts::default();
        for (status, count) in rows {
            match TaskStatus::parse(&status) {
                Some(TaskStatus::Pending) => counts.pending = count,
                Some(TaskStatus::InProgress) => counts.in_progress = count,
                Some(TaskStatus::Completed) => counts.completed = count,
                None => {}
            }
        }
        Ok(counts)
    }
}
