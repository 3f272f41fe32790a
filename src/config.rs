use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub allowed_email_suffix: String,
    pub upload_dir: String,
    pub file_base_url: Option<String>,
    pub max_upload_bytes: usize,
    pub file_sweep_interval_secs: u64,
    pub file_sweep_grace_secs: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub public_app_url: String,
    pub smtp: Option<SmtpConfig>,
}

/// Outbound mail relay. Present only when `SMTP_HOST` is set.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub starttls: bool,
}

const MIN_SECRET_LEN: usize = 32;

fn env_or<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET must be set".to_string()))?;

        let config = Config {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("SERVER_PORT", "8080")?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://campus_portal.db?mode=rwc".to_string()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: env_or("DB_MIN_CONNECTIONS", "5")?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", "30")?,
            jwt_secret,
            access_token_ttl_minutes: env_or::<i64>("ACCESS_TOKEN_TTL_MINUTES", "60")?
                .clamp(15, 24 * 60),
            refresh_token_ttl_days: env_or::<i64>("REFRESH_TOKEN_TTL_DAYS", "14")?.clamp(7, 30),
            allowed_email_suffix: std::env::var("ALLOWED_EMAIL_SUFFIX")
                .unwrap_or_else(|_| ".edu.tr".to_string())
                .to_lowercase(),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            file_base_url: std::env::var("FILE_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", "20971520")?,
            file_sweep_interval_secs: env_or("FILE_SWEEP_INTERVAL_SECS", "600")?,
            file_sweep_grace_secs: env_or("FILE_SWEEP_GRACE_SECS", "3600")?,
            argon2_memory_kib: env_or("ARGON2_MEMORY_KIB", "19456")?,
            argon2_iterations: env_or("ARGON2_ITERATIONS", "2")?,
            public_app_url: std::env::var("PUBLIC_APP_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            smtp: SmtpConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "JWT_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.db_min_connections > self.db_max_connections {
            return Err(AppError::Config(
                "DB_MIN_CONNECTIONS exceeds DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config("REQUEST_TIMEOUT_SECS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Settings suitable for tests and local tooling: cheap hashing, in-memory database.
    pub fn for_tests() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            request_timeout_secs: 30,
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            allowed_email_suffix: ".edu.tr".to_string(),
            upload_dir: "./uploads".to_string(),
            file_base_url: None,
            max_upload_bytes: 5 * 1024 * 1024,
            file_sweep_interval_secs: 600,
            file_sweep_grace_secs: 3600,
            argon2_memory_kib: 64,
            argon2_iterations: 1,
            public_app_url: "http://localhost:8080".to_string(),
            smtp: None,
        }
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, AppError> {
        let Some(host) = std::env::var("SMTP_HOST")
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(SmtpConfig {
            host,
            port: env_or("SMTP_PORT", "587")?,
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Campus Portal <noreply@localhost>".to_string()),
            starttls: env_or("SMTP_STARTTLS", "true")?,
        }))
    }
}
