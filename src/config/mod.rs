//! Configuration management
//!
//! Configuration is loaded from `config.yml` and can be overridden by
//! `COURSEHUB_*` environment variables. Missing values fall back to defaults,
//! so a fresh checkout starts without any configuration file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// File store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Site (presentation bundle) configuration
    #[serde(default)]
    pub site: SiteConfig,
    /// Route guard path sets
    #[serde(default)]
    pub guard: GuardConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Project id API clients must present in `X-Project-Id` (unchecked when unset)
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            project_id: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/coursehub.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in days
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: i64,
    /// Name of the session marker cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_lifetime_days(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

fn default_lifetime_days() -> i64 {
    7
}

fn default_cookie_name() -> String {
    "token".to_string()
}

impl SessionConfig {
    /// Max-Age of the session cookie in seconds
    pub fn max_age_seconds(&self) -> i64 {
        self.lifetime_days * 24 * 60 * 60
    }

    /// `Set-Cookie` value carrying a session token
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            token,
            self.max_age_seconds()
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.cookie_name)
    }
}

/// File store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory; buckets are subdirectories
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Bucket used for course content uploads
    #[serde(default = "default_bucket")]
    pub default_bucket: String,
    /// Maximum file size in bytes (default: 500MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            default_bucket: default_bucket(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("storage")
}

fn default_bucket() -> String {
    "course-content".to_string()
}

fn default_max_file_size() -> u64 {
    500 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "video/mp4",
        "video/webm",
        "video/quicktime",
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "text/plain",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

impl StorageConfig {
    /// Check if a MIME type is accepted for upload
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }
}

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public base URL, used to build download locators
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
    /// Directory holding the prebuilt presentation bundle
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            app_base_url: default_app_base_url(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_app_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("web/dist")
}

/// Route guard configuration
///
/// Protected entries ending in `*` match the prefix and everything below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,
    #[serde(default = "default_auth_only")]
    pub auth_only: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected: default_protected(),
            auth_only: default_auth_only(),
        }
    }
}

fn default_protected() -> Vec<String> {
    vec!["/dashboard*".to_string(), "/courses/checkout".to_string()]
}

fn default_auth_only() -> Vec<String> {
    vec!["/auth/login".to_string(), "/auth/signup".to_string()]
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is reported with its location.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - COURSEHUB_SERVER_HOST / COURSEHUB_SERVER_PORT / COURSEHUB_SERVER_CORS_ORIGIN
    /// - COURSEHUB_PROJECT_ID
    /// - COURSEHUB_DATABASE_DRIVER / COURSEHUB_DATABASE_URL
    /// - COURSEHUB_SESSION_LIFETIME_DAYS
    /// - COURSEHUB_STORAGE_PATH
    /// - COURSEHUB_APP_URL
    /// - COURSEHUB_STATIC_DIR
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("COURSEHUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("COURSEHUB_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("COURSEHUB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(project_id) = std::env::var("COURSEHUB_PROJECT_ID") {
            if !project_id.trim().is_empty() {
                self.server.project_id = Some(project_id);
            }
        }

        if let Ok(driver) = std::env::var("COURSEHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("COURSEHUB_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(days) = std::env::var("COURSEHUB_SESSION_LIFETIME_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if days > 0 {
                    self.session.lifetime_days = days;
                }
            }
        }

        if let Ok(path) = std::env::var("COURSEHUB_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("COURSEHUB_APP_URL") {
            self.site.app_base_url = url;
        }
        if let Ok(dir) = std::env::var("COURSEHUB_STATIC_DIR") {
            self.site.static_dir = PathBuf::from(dir);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Tests that touch the process environment share this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
