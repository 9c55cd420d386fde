use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Present when a keyed-store backend is in use; document-mode tooling
    /// runs without it.
    pub database_url: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Directory the admin upload drops supplier workbooks into.
    pub workbook_dir: PathBuf,
    /// Preferred workbook file name inside `workbook_dir`.
    pub workbook_file: String,
    /// Path of the JSON catalog document (document mode).
    pub catalog_json: PathBuf,
    pub layouts_path: PathBuf,
    /// Name of the spreadsheet template to use, resolved against the
    /// layouts file.
    pub layout_name: String,
    /// Bs per USD fallback used when a template has no Bs column.
    pub exchange_rate: f64,
    /// Supplier discount fraction used when neither the sheet nor an
    /// override provides one.
    pub default_discount: f64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// Returns the database URL or a configuration error naming the missing
    /// variable, for consumers that require the keyed store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` is unset.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("workbook_dir", &self.workbook_dir)
            .field("workbook_file", &self.workbook_file)
            .field("catalog_json", &self.catalog_json)
            .field("layouts_path", &self.layouts_path)
            .field("layout_name", &self.layout_name)
            .field("exchange_rate", &self.exchange_rate)
            .field("default_discount", &self.default_discount)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
