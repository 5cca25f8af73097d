//! Configuration module for the ISIS backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ingest::OrphanPolicy;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Credentials of the admin account created at startup when none exists.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// HS256 signing secret; a random one is generated when absent
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: i64,
    /// Upper bound for request bodies, uploads included
    pub max_upload_bytes: usize,
    /// PBKDF2 iterations for newly hashed passwords
    pub password_rounds: u32,
    /// What to do with child rows that appear before any parent row
    pub orphan_rows: OrphanPolicy,
    pub admin_bootstrap: Option<AdminBootstrap>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("ISIS_DB_PATH")
            .unwrap_or_else(|_| "./data/isis.sqlite".to_string())
            .into();

        let bind_addr = env::var("ISIS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .expect("Invalid ISIS_BIND_ADDR format");

        let log_level = env::var("ISIS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("ISIS_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let jwt_secret = env::var("ISIS_JWT_SECRET").ok().filter(|s| !s.is_empty());

        let orphan_rows = match env::var("ISIS_ORPHAN_ROWS").as_deref() {
            Ok("reject") => OrphanPolicy::Reject,
            _ => OrphanPolicy::Drop,
        };

        let admin_bootstrap = match (
            env::var("ISIS_ADMIN_USERNAME"),
            env::var("ISIS_ADMIN_PASSWORD"),
            env::var("ISIS_ADMIN_EMAIL"),
        ) {
            (Ok(username), Ok(password), Ok(email)) => Some(AdminBootstrap {
                username,
                password,
                email,
            }),
            _ => None,
        };

        Self {
            db_path,
            bind_addr,
            log_level,
            log_format,
            jwt_secret,
            jwt_expiry_hours: env_number("ISIS_JWT_EXPIRY_HOURS", 24),
            max_upload_bytes: env_number::<usize>("ISIS_MAX_UPLOAD_MB", 16) * 1024 * 1024,
            password_rounds: env_number("ISIS_PASSWORD_ROUNDS", 600_000),
            orphan_rows,
            admin_bootstrap,
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
