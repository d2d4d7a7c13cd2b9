//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{
    CookieSettings, LOGGED_IN_COOKIE_NAME, REFRESH_COOKIE_NAME, SameSite, hash_password,
};
use crate::db::{Database, NewUser, UserRole};
use crate::jwt::{
    DEFAULT_ACCESS_LIFETIME_SECS, DEFAULT_REFRESH_LIFETIME_SECS, MAX_LIFETIME_SECS, TokenLifetimes,
};
use clap::Parser;
use std::num::NonZeroU32;
use tracing::{error, info, warn};
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_SUPERADMIN_PASSWORD_LENGTH: usize = 8;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Taskgate",
    about = "Role-based task administration with cookie/JWT sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "taskgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_LIFETIME_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_LIFETIME_SECS))]
    pub access_lifetime_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_LIFETIME_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_LIFETIME_SECS))]
    pub refresh_lifetime_secs: u64,

    /// Name of the access token cookie
    #[arg(long, default_value = "access", value_parser = validate_cookie_name)]
    pub cookie_name: String,

    /// Path attribute of the auth cookies
    #[arg(long, default_value = "/", value_parser = validate_cookie_path)]
    pub cookie_path: String,

    /// Omit the Secure attribute on auth cookies (plain HTTP development only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// SameSite attribute of the auth cookies
    #[arg(long, default_value = "lax")]
    pub cookie_same_site: SameSite,

    /// Keep the existing refresh token on refresh instead of issuing a new one
    #[arg(long)]
    pub no_rotate_refresh: bool,

    /// Login attempts allowed per client IP per minute
    #[arg(long, default_value = "10")]
    pub login_attempts_per_minute: NonZeroU32,

    /// Take the client IP from X-Forwarded-For (only behind a trusted reverse proxy)
    #[arg(long)]
    pub trust_proxy: bool,

    /// bcrypt cost for password hashes
    #[arg(long, default_value_t = crate::DEFAULT_BCRYPT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Create a superadmin with this username on startup.
    /// The password is read from the SUPERADMIN_PASSWORD env var
    #[arg(long, requires_all = ["superadmin_email", "superadmin_mobile"])]
    pub create_superadmin: Option<String>,

    /// Email for --create-superadmin
    #[arg(long)]
    pub superadmin_email: Option<String>,

    /// Mobile number for --create-superadmin
    #[arg(long)]
    pub superadmin_mobile: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_cookie_name(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("Cookie name cannot be empty".to_string());
    }

    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(format!("Cookie name contains invalid characters: {}", s));
    }

    if s == REFRESH_COOKIE_NAME || s == LOGGED_IN_COOKIE_NAME {
        return Err(format!("Cookie name is reserved: {}", s));
    }

    Ok(s.to_string())
}

fn validate_cookie_path(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Cookie path must start with '/': {}", s));
    }

    if s.chars()
        .any(|c| !c.is_ascii() || c.is_whitespace() || c.is_ascii_control() || c == ';')
    {
        return Err(format!("Cookie path contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read a secret from an environment variable and remove it from the environment.
fn take_env_secret(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    // SAFETY: We're single-threaded at this point during startup,
    // and no other code is reading this environment variable.
    unsafe { std::env::remove_var(name) };
    Some(value)
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Some(secret) = take_env_secret("JWT_SECRET") {
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Handle the --create-superadmin flag.
///
/// An existing account with the same username is left alone. Any other
/// failure exits the process.
pub async fn handle_create_superadmin(db: &Database, args: &Args) {
    let Some(username) = args.create_superadmin.as_deref() else {
        return;
    };
    let (Some(email), Some(mobile)) = (
        args.superadmin_email.as_deref(),
        args.superadmin_mobile.as_deref(),
    ) else {
        error!("--create-superadmin requires --superadmin-email and --superadmin-mobile");
        std::process::exit(1);
    };

    match db.users().get_by_username(username).await {
        Ok(Some(existing)) => {
            println!();
            println!(
                "User {} already exists with role {}",
                existing.username, existing.role
            );
            println!();
            return;
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing superadmin");
            std::process::exit(1);
        }
    }

    let Some(password) = take_env_secret("SUPERADMIN_PASSWORD") else {
        error!("SUPERADMIN_PASSWORD environment variable is required with --create-superadmin");
        std::process::exit(1);
    };
    if password.len() < MIN_SUPERADMIN_PASSWORD_LENGTH {
        error!(
            "Superadmin password is shorter than {} characters",
            MIN_SUPERADMIN_PASSWORD_LENGTH
        );
        std::process::exit(1);
    }

    let password_hash = match hash_password(&password, args.bcrypt_cost) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash superadmin password");
            std::process::exit(1);
        }
    };

    match db.users().find_conflict(username, email, mobile).await {
        Ok(None) => {}
        Ok(Some(conflict)) => {
            error!(conflict = conflict.message(), "Cannot create superadmin");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Failed to check for conflicting users");
            std::process::exit(1);
        }
    }

    let uuid = Uuid::new_v4().to_string();
    let new_user = NewUser {
        uuid: &uuid,
        name: username,
        email,
        username,
        mobile,
        role: UserRole::Superadmin,
        assigned_admin: None,
    };

    match db.users().create(&new_user, &password_hash).await {
        Ok(_) => {
            info!(user = %uuid, "Superadmin created");
            println!();
            println!("Superadmin created: {}", username);
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create superadmin");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    if args.insecure_cookies && args.cookie_same_site == SameSite::None {
        warn!("SameSite=None cookies without Secure are rejected by browsers");
    }
    if args.refresh_lifetime_secs <= args.access_lifetime_secs {
        warn!(
            access = args.access_lifetime_secs,
            refresh = args.refresh_lifetime_secs,
            "Refresh tokens do not outlive access tokens"
        );
    }

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        lifetimes: TokenLifetimes {
            access_secs: args.access_lifetime_secs,
            refresh_secs: args.refresh_lifetime_secs,
        },
        cookies: CookieSettings {
            access_name: args.cookie_name.clone(),
            path: args.cookie_path.clone(),
            secure: !args.insecure_cookies,
            http_only: true,
            same_site: args.cookie_same_site,
        },
        rotate_refresh_tokens: !args.no_rotate_refresh,
        login_attempts_per_minute: args.login_attempts_per_minute,
        trust_proxy: args.trust_proxy,
        bcrypt_cost: args.bcrypt_cost,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
