use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
///
/// Variants are declared from least to most privileged so the derived
/// ordering doubles as the role hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
    Superadmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Superadmin => "superadmin",
        }
    }

    /// Parse a stored role name. Returns `None` for anything outside the three roles.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            "superadmin" => Some(UserRole::Superadmin),
            _ => None,
        }
    }

    /// The single role policy predicate: does this role carry at least
    /// the privileges of `threshold`?
    pub fn is_at_least(self, threshold: UserRole) -> bool {
        self >= threshold
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored account. Serializes without the internal row id.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub mobile: String,
    pub role: UserRole,
    pub active: bool,
    /// UUID of the admin this account is assigned to.
    pub assigned_admin: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    name: String,
    email: String,
    username: String,
    mobile: String,
    role: String,
    active: i32,
    assigned_admin: Option<String>,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            name: row.name,
            email: row.email,
            username: row.username,
            mobile: row.mobile,
            // The CHECK constraint on users.role keeps this exhaustive; fall back to
            // the least privileged role rather than failing the whole row.
            role: UserRole::parse(&row.role).unwrap_or(UserRole::User),
            active: row.active != 0,
            assigned_admin: row.assigned_admin,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub uuid: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub mobile: &'a str,
    pub role: UserRole,
    /// UUID of an existing admin.
    pub assigned_admin: Option<&'a str>,
}

/// Which unique column an insert would collide with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConflict {
    Username,
    Email,
    Mobile,
}

impl UserConflict {
    pub fn message(&self) -> &'static str {
        match self {
            UserConflict::Username => "Username already exists.",
            UserConflict::Email => "Email already in use.",
            UserConflict::Mobile => "Mobile number already in use.",
        }
    }
}

macro_rules! select_user {
    ($tail:literal) => {
        concat!(
            "SELECT u.id, u.uuid, u.name, u.email, u.username, u.mobile, u.role, u.active, \
             a.uuid AS assigned_admin, u.created_at \
             FROM users u LEFT JOIN users a ON a.id = u.assigned_admin_id ",
            $tail
        )
    };
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new active account. Returns the user ID.
    pub async fn create(&self, user: &NewUser<'_>, password_hash: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, name, email, username, mobile, password_hash, role, assigned_admin_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, (SELECT id FROM users WHERE uuid = ?))",
        )
        .bind(user.uuid)
        .bind(user.name)
        .bind(user.email)
        .bind(user.username)
        .bind(user.mobile)
        .bind(password_hash)
        .bind(user.role.as_str())
        .bind(user.assigned_admin)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Find the first unique column that `username`, `email` or `mobile` would collide with.
    pub async fn find_conflict(
        &self,
        username: &str,
        email: &str,
        mobile: &str,
    ) -> Result<Option<UserConflict>, sqlx::Error> {
        // MAX over an empty table yields NULL, hence the Options.
        let (username, email, mobile): (Option<i32>, Option<i32>, Option<i32>) = sqlx::query_as(
            "SELECT MAX(username = ?), MAX(email = ?), MAX(mobile = ?) FROM users",
        )
        .bind(username)
        .bind(email)
        .bind(mobile)
        .fetch_one(&self.pool)
        .await?;

        let conflict = if username.unwrap_or(0) != 0 {
            Some(UserConflict::Username)
        } else if email.unwrap_or(0) != 0 {
            Some(UserConflict::Email)
        } else if mobile.unwrap_or(0) != 0 {
            Some(UserConflict::Mobile)
        } else {
            None
        };
        Ok(conflict)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE u.uuid = ?"))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE u.username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Get a user and their password hash by username or email.
    /// Username matches take precedence over email matches.
    pub async fn get_login(&self, login: &str) -> Result<Option<(User, String)>, sqlx::Error> {
        let row: Option<LoginRow> = sqlx::query_as(
            "SELECT u.id, u.uuid, u.name, u.email, u.username, u.mobile, u.role, u.active,
                    a.uuid AS assigned_admin, u.created_at, u.password_hash
             FROM users u LEFT JOIN users a ON a.id = u.assigned_admin_id
             WHERE u.username = ? OR u.email = ? COLLATE NOCASE
             ORDER BY u.username = ? DESC
             LIMIT 1",
        )
        .bind(login)
        .bind(login)
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| (User::from(r.user), r.password_hash)))
    }

    /// List users with the given role, newest first.
    pub async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> =
            sqlx::query_as(select_user!("WHERE u.role = ? ORDER BY u.created_at DESC, u.id DESC"))
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Count users with the given role.
    pub async fn count_by_role(&self, role: UserRole) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Flip the active flag. Returns the new value, or `None` if the user does not exist.
    pub async fn toggle_active(&self, id: i64) -> Result<Option<bool>, sqlx::Error> {
        let row: Option<(i32,)> =
            sqlx::query_as("UPDATE users SET active = 1 - active WHERE id = ? RETURNING active")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0 != 0))
    }

    /// Set the role for a user.
    pub async fn set_role(&self, id: i64, role: UserRole) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user by ID.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
