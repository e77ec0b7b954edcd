//! Application settings loaded from `config.toml` and the environment.
//!
//! Every section has defaults so a missing file still yields a usable configuration.
//! Hosting credentials never live in source: `HOSTING_CLOUD_NAME` and
//! `HOSTING_UPLOAD_PRESET` override whatever the file says.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Report compilation settings
    pub report: ReportConfig,
    /// Who files resource requests
    pub requester: RequesterConfig,
    /// File hosting API settings
    pub hosting: HostingConfig,
}

/// Report compilation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Prefix of every generated file name, e.g. `"Expense Report 2024-03-01.pdf"`
    pub label: String,
    /// PNG/JPEG logo embedded at the top of the spreadsheet
    pub logo_path: Option<PathBuf>,
    /// Directory where the compiled archive is saved locally
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            label: "Expense Report".to_string(),
            logo_path: None,
            output_dir: PathBuf::from("reports"),
        }
    }
}

/// Identity printed on resource requests and report summaries
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequesterConfig {
    /// Person requesting the funds
    pub name: String,
    /// Project the expenses are charged to
    pub project: String,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed Requester".to_string(),
            project: "General".to_string(),
        }
    }
}

/// File hosting API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostingConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Account (cloud) name; prefer the `HOSTING_CLOUD_NAME` env var
    pub cloud_name: Option<String>,
    /// Unsigned upload preset; prefer the `HOSTING_UPLOAD_PRESET` env var
    pub upload_preset: Option<String>,
    /// Folder receipts are uploaded into
    pub receipt_folder: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloudinary.com".to_string(),
            cloud_name: None,
            upload_preset: None,
            receipt_folder: "expense_receipts".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl HostingConfig {
    /// Applies `HOSTING_CLOUD_NAME` / `HOSTING_UPLOAD_PRESET` / `HOSTING_BASE_URL` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(cloud_name) = std::env::var("HOSTING_CLOUD_NAME") {
            self.cloud_name = Some(cloud_name);
        }
        if let Ok(preset) = std::env::var("HOSTING_UPLOAD_PRESET") {
            self.upload_preset = Some(preset);
        }
        if let Ok(base_url) = std::env::var("HOSTING_BASE_URL") {
            self.base_url = base_url;
        }
    }

    /// Returns `(cloud_name, upload_preset)` or a configuration error naming the missing one.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let cloud_name = self
            .cloud_name
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config {
                message: "HOSTING_CLOUD_NAME is not set".to_string(),
            })?;
        let preset = self
            .upload_preset
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config {
                message: "HOSTING_UPLOAD_PRESET is not set".to_string(),
            })?;
        Ok((cloud_name, preset))
    }
}

/// Parses a configuration file without applying environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads the application configuration.
///
/// Reads the file named by `EXPENSE_BUDDY_CONFIG` (default `config.toml`), falls back to
/// defaults when the file does not exist, then applies environment overrides.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var("EXPENSE_BUDDY_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let mut config = if path.exists() {
        let config = load_config(&path)?;
        info!("Loaded configuration from {}", path.display());
        config
    } else {
        warn!(
            "Configuration file {} not found, using defaults.",
            path.display()
        );
        AppConfig::default()
    };

    config.hosting.apply_env_overrides();
    Ok(config)
}
