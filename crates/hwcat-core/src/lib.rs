use thiserror::Error;

pub mod app_config;
pub mod catalog;
pub mod config;
pub mod layouts;

pub use app_config::{AppConfig, Environment};
pub use catalog::{CatalogEntry, DEFAULT_SALE_LABEL, NEW_BADGE};
pub use config::{load_app_config, load_app_config_from_env, resolve_workbook};
pub use layouts::{
    builtin as builtin_layout, load_layouts, CellRef, ColumnMap, LayoutsFile, MarginSchedule,
    MarginTier, SheetLayout,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read layouts file {path}")]
    LayoutsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse layouts file")]
    LayoutsFileParse(#[from] serde_yaml::Error),
    #[error("{0}")]
    Validation(String),
}
