//! Botline configuration file handling
//!
//! Loads and manages the ~/.config/botline/config.yaml file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("botline");
    path.push("botline.db");
    path
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Mailbox behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Whether messages may reference an earlier message via replyTo
    #[serde(default = "default_allow_replies")]
    pub allow_replies: bool,
}

fn default_allow_replies() -> bool {
    true
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            allow_replies: default_allow_replies(),
        }
    }
}

/// Botline configuration
///
/// Represents the complete ~/.config/botline/config.yaml file. Every section
/// is optional; an empty file yields a working local setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotlineConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Mailbox behavior settings
    #[serde(default)]
    pub mailbox: MailboxConfig,
}

impl BotlineConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path, falling back to defaults
    /// when no file exists
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::new())
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::BotlineError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading Botline configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save_default(&self) -> Result<()> {
        let path = Self::default_path();
        self.save(&path)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving Botline configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/botline/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("botline");
        path.push("config.yaml");
        path
    }
}
