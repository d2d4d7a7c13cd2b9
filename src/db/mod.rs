mod task;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use task::{StatusUpdate, Task, TaskCounts, TaskFields, TaskStatus, TaskStore};
pub use user::{NewUser, User, UserConflict, UserRole, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    username TEXT UNIQUE NOT NULL,
                    mobile TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user'
                        CHECK (role IN ('superadmin', 'admin', 'user')),
                    active INTEGER NOT NULL DEFAULT 1,
                    assigned_admin_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_role ON users(role)",
                "CREATE INDEX idx_users_assigned_admin ON users(assigned_admin_id)",
                "CREATE TABLE tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    assigned_to_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_by_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                    due_date TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'in_progress', 'completed')),
                    completion_report TEXT,
                    worked_hours REAL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_tasks_assigned_to ON tasks(assigned_to_id)",
                "CREATE INDEX idx_tasks_status ON tasks(status)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the task store.
    pub fn tasks(&self) -> TaskStore {
        TaskStore::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(
        uuid: &'a str,
        username: &'a str,
        email: &'a str,
        mobile: &'a str,
        role: UserRole,
    ) -> NewUser<'a> {
        NewUser {
            uuid,
            name: "Test User",
            email,
            username,
            mobile,
            role,
            assigned_admin: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let user = NewUser {
            uuid: "uuid-123",
            name: "Alice",
            email: "alice@example.com",
            username: "alice",
            mobile: "5550001",
            role: UserRole::User,
            assigned_admin: None,
        };
        let id = db.users().create(&user, "hash").await.unwrap();

        let fetched = db.users().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.uuid, "uuid-123");
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.role, UserRole::User);
        assert!(fetched.active);
        assert!(fetched.assigned_admin.is_none());

        let fetched = db.users().get_by_uuid("uuid-123").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        let fetched = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn test_login_lookup_by_username_or_email() {
        let db = Database::open(":memory:").await.unwrap();
        db.users()
            .create(&new_user("uuid-1", "alice", "alice@example.com", "5550001", UserRole::User), "hash-a")
            .await
            .unwrap();

        let (user, hash) = db.users().get_login("alice").await.unwrap().unwrap();
        assert_eq!(user.uuid, "uuid-1");
        assert_eq!(hash, "hash-a");

        let (user, _) = db
            .users()
            .get_login("ALICE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.uuid, "uuid-1");

        assert!(db.users().get_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_fields_fail() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = NewUser {
            uuid: "uuid-1",
            name: "Alice",
            email: "alice@example.com",
            username: "alice",
            mobile: "5550001",
            role: UserRole::User,
            assigned_admin: None,
        };
        db.users().create(&alice, "hash").await.unwrap();

        assert_eq!(
            db.users()
                .find_conflict("alice", "other@example.com", "5550002")
                .await
                .unwrap(),
            Some(UserConflict::Username)
        );
        assert_eq!(
            db.users()
                .find_conflict("bob", "Alice@Example.com", "5550002")
                .await
                .unwrap(),
            Some(UserConflict::Email)
        );
        assert_eq!(
            db.users()
                .find_conflict("bob", "bob@example.com", "5550001")
                .await
                .unwrap(),
            Some(UserConflict::Mobile)
        );
        assert_eq!(
            db.users()
                .find_conflict("bob", "bob@example.com", "5550002")
                .await
                .unwrap(),
            None
        );

        let dup = NewUser {
            uuid: "uuid-2",
            ..alice
        };
        assert!(db.users().create(&dup, "hash").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_role_rejected_by_schema() {
        let db = Database::open(":memory:").await.unwrap();
        let result = sqlx::query(
            "INSERT INTO users (uuid, name, email, username, mobile, password_hash, role)
             VALUES ('u', 'n', 'e@x', 'un', '1', 'h', 'root')",
        )
        .execute(&db.pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_admin_clears_assignment() {
        let db = Database::open(":memory:").await.unwrap();
        let admin_id = db
            .users()
            .create(&new_user("admin-uuid", "boss", "boss@example.com", "5550002", UserRole::Admin), "hash")
            .await
            .unwrap();
        let mut worker = new_user("worker-uuid", "worker", "worker@example.com", "5550003", UserRole::User);
        worker.assigned_admin = Some("admin-uuid");
        db.users().create(&worker, "hash").await.unwrap();

        let fetched = db.users().get_by_uuid("worker-uuid").await.unwrap().unwrap();
        assert_eq!(fetched.assigned_admin.as_deref(), Some("admin-uuid"));

        assert!(db.users().delete(admin_id).await.unwrap());

        let fetched = db.users().get_by_uuid("worker-uuid").await.unwrap().unwrap();
        assert!(fetched.assigned_admin.is_none());
    }

    #[tokio::test]
    async fn test_toggle_active_and_role() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create(&new_user("uuid-1", "alice", "alice@example.com", "5550001", UserRole::User), "hash")
            .await
            .unwrap();

        assert_eq!(db.users().toggle_active(id).await.unwrap(), Some(false));
        assert_eq!(db.users().toggle_active(id).await.unwrap(), Some(true));
        assert_eq!(db.users().toggle_active(id + 100).await.unwrap(), None);

        assert!(db.users().set_role(id, UserRole::Admin).await.unwrap());
        assert_eq!(db.users().count_by_role(UserRole::Admin).await.unwrap(), 1);
        assert_eq!(db.users().count_by_role(UserRole::User).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let db = Database::open(":memory:").await.unwrap();
        let admin_id = db
            .users()
            .create(&new_user("admin-uuid", "boss", "boss@example.com", "5550002", UserRole::Admin), "hash")
            .await
            .unwrap();
        let worker_id = db
            .users()
            .create(&new_user("worker-uuid", "worker", "worker@example.com", "5550003", UserRole::User), "hash")
            .await
            .unwrap();

        let fields = TaskFields {
            title: "Inventory",
            description: "Count the boxes",
            assigned_to_id: worker_id,
            due_date: chrono::NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
            status: TaskStatus::Pending,
        };
        let task_id = db.tasks().create(&fields, admin_id).await.unwrap();

        let task = db.tasks().get(task_id).await.unwrap().unwrap();
        assert_eq!(task.assigned_to, "worker-uuid");
        assert_eq!(task.created_by.as_deref(), Some("admin-uuid"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.due_date, fields.due_date);

        let update = StatusUpdate {
            status: TaskStatus::Completed,
            completion_report: Some("Done"),
            worked_hours: Some(2.5),
        };
        // Only the assignee can update status.
        assert!(!db.tasks().update_status(task_id, admin_id, &update).await.unwrap());
        assert!(db.tasks().update_status(task_id, worker_id, &update).await.unwrap());

        let task = db.tasks().get(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.worked_hours, Some(2.5));

        let counts = db.tasks().count_by_status().await.unwrap();
        assert_eq!(
            counts,
            TaskCounts {
                pending: 0,
                in_progress: 0,
                completed: 1
            }
        );

        assert_eq!(db.tasks().list_for_user(worker_id).await.unwrap().len(), 1);
        assert!(db.tasks().list_for_user(admin_id).await.unwrap().is_empty());

        // Deleting the assignee removes their tasks.
        db.users().delete(worker_id).await.unwrap();
        assert!(db.tasks().get(task_id).await.unwrap().is_none());
    }
}
