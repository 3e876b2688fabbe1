//! Configuration for the dmc workload provisioner
//!
//! The configuration lives in a TOML file. Every key is optional; an absent
//! key (or an absent file) falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use which::which;

pub const DEFAULT_IMAGE: &str = "itzg/minecraft-server:java17";
pub const DEFAULT_SERVER_TYPE: &str = "SPIGOT";
pub const DEFAULT_SERVER_VERSION: &str = "1.20.1";
pub const DEFAULT_GAME_MODE: &str = "CREATIVE";
pub const DEFAULT_HOST_IP: &str = "0.0.0.0";
pub const DEFAULT_SERVICE_PORT: u16 = 25565;
pub const DEFAULT_DATA_PATH: &str = "/data";
pub const DEFAULT_NAME_PREFIX: &str = "dmc";
pub const DEFAULT_RUNTIME_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ARCHIVE_MB: u64 = 50;
pub const RUNTIME_BINARY_NAME: &str = "docker";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "DMC_CONFIG";

const POINTER_FILE_NAME: &str = ".dmc_config_path";

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: &[&str] = &[
    "storage-path",
    "runtime-path",
    "image",
    "server-type",
    "server-version",
    "game-mode",
    "host-ip",
    "host-port",
    "container-port",
    "data-path",
    "name-prefix",
    "runtime-timeout-secs",
    "max-archive-mb",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}. Supported keys: {keys}", keys = KEYS.join(", "))]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Container runtime not found: {0}")]
    RuntimeNotFound(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_archive_mb: Option<u64>,
}

impl Config {
    pub fn path() -> PathBuf {
        // Honor explicit override via DMC_CONFIG for tests / isolated runs.
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        let default = Self::default_path();

        // A pointer file next to the default config may redirect to another location
        if let Some(pointer) = Self::pointer_path(&default) {
            if pointer.exists() {
                if let Ok(contents) = fs::read_to_string(&pointer) {
                    let trimmed = contents.trim();
                    if !trimmed.is_empty() {
                        return PathBuf::from(trimmed);
                    }
                }
            }
        }

        default
    }

    /// Platform default config file path, ignoring overrides
    pub fn default_path() -> PathBuf {
        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir().map_or_else(
                || PathBuf::from(".config/dmc/dmc.toml"),
                |h| h.join(".config").join("dmc").join("dmc.toml"),
            )
        }

        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map_or_else(
                || PathBuf::from("config\\dmc\\dmc.toml"),
                |c| c.join("dmc").join("dmc.toml"),
            )
        }
    }

    /// Location of the pointer file that redirects the config path
    pub fn pointer_path(default: &Path) -> Option<PathBuf> {
        default.parent().map(|parent| parent.join(POINTER_FILE_NAME))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "storage-path" => self.storage_path.clone(),
            "runtime-path" => self.runtime_path.clone(),
            "image" => self.image.clone(),
            "server-type" => self.server_type.clone(),
            "server-version" => self.server_version.clone(),
            "game-mode" => self.game_mode.clone(),
            "host-ip" => self.host_ip.clone(),
            "host-port" => self.host_port.map(|p| p.to_string()),
            "container-port" => self.container_port.map(|p| p.to_string()),
            "data-path" => self.data_path.clone(),
            "name-prefix" => self.name_prefix.clone(),
            "runtime-timeout-secs" => self.runtime_timeout_secs.map(|s| s.to_string()),
            "max-archive-mb" => self.max_archive_mb.map(|m| m.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        match key {
            "storage-path" => self.storage_path = Some(value),
            "runtime-path" => self.runtime_path = Some(value),
            "image" => self.image = Some(value),
            "server-type" => self.server_type = Some(value),
            "server-version" => self.server_version = Some(value),
            "game-mode" => self.game_mode = Some(value.to_ascii_uppercase()),
            "host-ip" => self.host_ip = Some(value),
            "host-port" => self.host_port = Some(parse_number(key, &value)?),
            "container-port" => self.container_port = Some(parse_number(key, &value)?),
            "data-path" => self.data_path = Some(value),
            "name-prefix" => self.name_prefix = Some(value),
            "runtime-timeout-secs" => self.runtime_timeout_secs = Some(parse_number(key, &value)?),
            "max-archive-mb" => self.max_archive_mb = Some(parse_number(key, &value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Config::default()
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    /// Base directory holding one storage root per tenant
    pub fn get_storage_path(&self) -> PathBuf {
        if let Some(ref path) = self.storage_path {
            return PathBuf::from(path);
        }
        dirs::data_dir().map_or_else(
            || PathBuf::from("docker").join("storage"),
            |d| d.join("dmc").join("storage"),
        )
    }

    pub fn get_image(&self) -> String {
        self.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string())
    }

    pub fn get_server_type(&self) -> String {
        self.server_type
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_TYPE.to_string())
    }

    pub fn get_server_version(&self) -> String {
        self.server_version
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_VERSION.to_string())
    }

    pub fn get_game_mode(&self) -> String {
        self.game_mode
            .clone()
            .unwrap_or_else(|| DEFAULT_GAME_MODE.to_string())
    }

    pub fn get_host_ip(&self) -> String {
        self.host_ip
            .clone()
            .unwrap_or_else(|| DEFAULT_HOST_IP.to_string())
    }

    pub fn get_host_port(&self) -> u16 {
        self.host_port.unwrap_or(DEFAULT_SERVICE_PORT)
    }

    pub fn get_container_port(&self) -> u16 {
        self.container_port.unwrap_or(DEFAULT_SERVICE_PORT)
    }

    pub fn get_data_path(&self) -> String {
        self.data_path
            .clone()
            .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())
    }

    pub fn get_name_prefix(&self) -> String {
        self.name_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string())
    }

    pub fn get_runtime_timeout(&self) -> Duration {
        Duration::from_secs(
            self.runtime_timeout_secs
                .unwrap_or(DEFAULT_RUNTIME_TIMEOUT_SECS),
        )
    }

    /// Upload ceiling per archive, in bytes
    pub fn get_max_archive_bytes(&self) -> u64 {
        self.max_archive_mb
            .unwrap_or(DEFAULT_MAX_ARCHIVE_MB)
            .saturating_mul(1024 * 1024)
    }

    pub fn ensure_storage_path(&self) -> Result<PathBuf, ConfigError> {
        let storage_path = self.get_storage_path();
        fs::create_dir_all(&storage_path)?;
        Ok(storage_path)
    }

    /// Locate the container runtime binary
    ///
    /// A configured `runtime-path` must exist; otherwise `docker` is looked up on `PATH`.
    pub fn resolve_runtime_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.runtime_path {
            let configured = PathBuf::from(path);
            if configured.exists() {
                return Ok(configured);
            }
            return Err(ConfigError::RuntimeNotFound(format!(
                "configured runtime-path does not exist: {}",
                path
            )));
        }

        which(RUNTIME_BINARY_NAME).map_err(|_| {
            ConfigError::RuntimeNotFound(format!(
                "'{}' is not installed or not on PATH",
                RUNTIME_BINARY_NAME
            ))
        })
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
