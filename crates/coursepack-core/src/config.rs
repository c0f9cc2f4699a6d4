//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is honoured) with typed
//! defaults, then checked by [`Config::validate`] before the server starts.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 200;
const MAX_EXTRACTED_SIZE_MB: u64 = 1024;
const MAX_EXTRACTED_FILES: usize = 10_000;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Which repository implementation backs the registry and progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryBackend {
    Postgres,
    Memory,
}

impl FromStr for RepositoryBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(RepositoryBackend::Postgres),
            "memory" | "in-memory" => Ok(RepositoryBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid repository backend: {}", s)),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub repository_backend: RepositoryBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Blob storage root for uploaded archives.
    pub upload_dir: PathBuf,
    /// Root under which each package's archive is extracted.
    pub content_dir: PathBuf,
    /// URL prefix under which the static file server exposes `content_dir`.
    pub content_base_url: String,
    pub max_upload_size_bytes: usize,
    pub max_extracted_size_bytes: u64,
    pub max_extracted_files: usize,
    /// Server-wide cap on in-flight HTTP requests.
    pub http_concurrency_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            repository_backend: RepositoryBackend::Postgres,
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            upload_dir: PathBuf::from("./data/uploads"),
            content_dir: PathBuf::from("./data/content"),
            content_base_url: "/content".to_string(),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            max_extracted_size_bytes: MAX_EXTRACTED_SIZE_MB * 1024 * 1024,
            max_extracted_files: MAX_EXTRACTED_FILES,
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let repository_backend = match env::var("REPOSITORY_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.repository_backend,
        };

        let max_upload_size_mb = parse_env("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);
        let max_extracted_size_mb = parse_env("MAX_EXTRACTED_SIZE_MB", MAX_EXTRACTED_SIZE_MB);

        Ok(Config {
            server_port: parse_env("SERVER_PORT", SERVER_PORT),
            environment,
            cors_origins,
            repository_backend,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            content_dir: env::var("CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            content_base_url: env::var("CONTENT_BASE_URL").unwrap_or(defaults.content_base_url),
            max_upload_size_bytes: max_upload_size_mb.saturating_mul(1024 * 1024),
            max_extracted_size_bytes: max_extracted_size_mb.saturating_mul(1024 * 1024),
            max_extracted_files: parse_env("MAX_EXTRACTED_FILES", MAX_EXTRACTED_FILES),
            http_concurrency_limit: parse_env("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT).max(1),
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.repository_backend == RepositoryBackend::Postgres {
            match self.database_url.as_deref() {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when REPOSITORY_BACKEND=postgres"
                    ))
                }
            }
        }

        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        if self.max_extracted_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_EXTRACTED_SIZE_MB must be greater than 0"));
        }
        if self.max_extracted_files == 0 {
            return Err(anyhow::anyhow!("MAX_EXTRACTED_FILES must be greater than 0"));
        }

        if self.upload_dir == self.content_dir {
            return Err(anyhow::anyhow!(
                "UPLOAD_DIR and CONTENT_DIR must be different directories"
            ));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
