//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "ENCORE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "encore.db";

/// Settings read from `config.toml`
///
/// Every field has a default so a partial (or missing) file still yields a
/// usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoreConfig {
    /// Root folder holding the database and local identity
    pub root_folder: Option<PathBuf>,
    /// Ledger service bind address
    pub bind_addr: String,
    /// Ledger service port
    pub port: u16,
    /// Base URL the voting client talks to
    pub server_url: String,
    /// First reconnect delay of the realtime feed; doubles per attempt
    pub feed_retry_base_ms: u64,
    /// Reconnect attempts before the feed gives up
    pub feed_max_retries: u32,
    /// EventBus capacity of the ledger service
    pub event_bus_capacity: usize,
}

impl Default for EncoreConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_addr: "127.0.0.1".to_string(),
            port: 5790,
            server_url: "http://127.0.0.1:5790".to_string(),
            feed_retry_base_ms: 1000,
            feed_max_retries: 3,
            event_bus_capacity: 1000,
        }
    }
}

impl EncoreConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from an explicit file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the platform config file, falling back to defaults
    ///
    /// A missing or malformed file is not fatal: it is logged and defaults
    /// are used.
    pub fn load() -> Self {
        match load_config_file() {
            Ok(path) => match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &EncoreConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &config.root_folder {
        return root_folder.clone();
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Create the root folder if needed and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE))
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    let config_dir = if cfg!(target_os = "linux") {
        // Try ~/.config/encore/config.toml first, then /etc/encore/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("encore").join("config.toml"));
        let system_config = PathBuf::from("/etc/encore/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else if cfg!(target_os = "macos") || cfg!(target_os = "windows") {
        dirs::config_dir()
            .map(|d| d.join("encore").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    } else {
        return Err(Error::Config("Unsupported platform".to_string()));
    };

    if config_dir.exists() {
        Ok(config_dir)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", config_dir)))
    }
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/encore (or /var/lib/encore for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("encore"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/encore"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("encore"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/encore"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("encore"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\encore"))
    } else {
        PathBuf::from("./encore_data")
    }
}
