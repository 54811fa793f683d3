//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file; everything the
//! administrator edits at runtime (fee, report email) lives in the database.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `TUITION_ROOT_FOLDER`
//! 3. `root_folder` key of an explicitly given TOML file
//! 4. OS-dependent compiled default (fallback)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ledger::{LedgerOptions, RemainingPolicy, Settings, MAX_AMOUNT};
use crate::sync::SyncConfig;
use crate::{Error, Result};

pub const ROOT_FOLDER_ENV: &str = "TUITION_ROOT_FOLDER";
pub const CONFIG_FILE_NAME: &str = "tuition.toml";
pub const DATABASE_FILE_NAME: &str = "tuition.db";
pub const ROSTER_FILE_NAME: &str = "roster.txt";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[admin]` section: the single basic-auth identity
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// Prefer TUITION_ADMIN_PASSWORD over storing this in the file
    #[serde(default)]
    pub password: Option<String>,
}

/// `[ledger]` section
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Fee seeded into a fresh database
    #[serde(default = "default_monthly_fee")]
    pub default_monthly_fee: i64,

    #[serde(default = "default_report_email")]
    pub default_report_email: Option<String>,

    /// Months after the current one that are always selectable
    #[serde(default = "default_upcoming_months")]
    pub upcoming_months: u32,

    #[serde(default)]
    pub remaining_policy: RemainingPolicy,
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5780
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_monthly_fee() -> i64 {
    350
}

fn default_report_email() -> Option<String> {
    Some("placeholder@example.com".to_string())
}

fn default_upcoming_months() -> u32 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            root_folder: None,
            admin: AdminConfig::default(),
            ledger: LedgerConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: None,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_monthly_fee: default_monthly_fee(),
            default_report_email: default_report_email(),
            upcoming_months: default_upcoming_months(),
            remaining_policy: RemainingPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LedgerConfig {
    /// Settings row seeded on first run
    pub fn default_settings(&self) -> Settings {
        Settings {
            monthly_fee: self.default_monthly_fee,
            report_email: self
                .default_report_email
                .clone()
                .filter(|e| !e.trim().is_empty()),
        }
    }

    pub fn options(&self) -> LedgerOptions {
        LedgerOptions {
            remaining_policy: self.remaining_policy,
            upcoming_months: self.upcoming_months,
        }
    }
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields defaults with a warning
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_AMOUNT).contains(&self.ledger.default_monthly_fee) {
            return Err(Error::Config(format!(
                "ledger.default_monthly_fee must be between 1 and {}, got {}",
                MAX_AMOUNT,
                self.ledger.default_monthly_fee
            )));
        }
        if self.admin.username.trim().is_empty() {
            return Err(Error::Config("admin.username must not be empty".to_string()));
        }
        if self.sync.enabled && self.sync.remote_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(Error::Config(
                "sync.remote_url is required when sync is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_root: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tuition"))
        .unwrap_or_else(|| PathBuf::from("./tuition_data"))
}

/// Layout of files under the root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: PathBuf,
}

impl RootFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the folder if it does not exist
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            std::fs::create_dir_all(&self.path)?;
            info!("Created root folder: {}", self.path.display());
        }
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE_NAME)
    }

    pub fn roster_path(&self) -> PathBuf {
        self.path.join(ROSTER_FILE_NAME)
    }

    /// Git working copy used by the sync backend
    pub fn sync_work_dir(&self) -> PathBuf {
        self.path.join("sync").join("repo")
    }

    /// Where snapshots are staged before publishing
    pub fn sync_staging_dir(&self) -> PathBuf {
        self.path.join("sync").join("staging")
    }
}
