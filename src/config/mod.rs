/// Database configuration and connection management
pub mod database;

/// Application settings loaded from config.toml and the environment
pub mod settings;

pub use settings::{AppConfig, HostingConfig, ReportConfig, RequesterConfig, load_app_config};
