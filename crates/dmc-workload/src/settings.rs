//! Game-server workload settings and runtime spec construction

use dmc_config::Config;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::errors::WorkloadError;
use crate::runtime::{BindMount, PortBinding, Protocol, WorkloadSpec};
use crate::tenant::TenantId;

const RESTART_POLICY: &str = "always";
const LOG_DRIVER: &str = "json-file";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameMode {
    Creative,
    Survival,
    Spectator,
    Adventure,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameMode::Creative => "CREATIVE",
            GameMode::Survival => "SURVIVAL",
            GameMode::Spectator => "SPECTATOR",
            GameMode::Adventure => "ADVENTURE",
        };
        f.write_str(label)
    }
}

impl FromStr for GameMode {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATIVE" => Ok(GameMode::Creative),
            "SURVIVAL" => Ok(GameMode::Survival),
            "SPECTATOR" => Ok(GameMode::Spectator),
            "ADVENTURE" => Ok(GameMode::Adventure),
            other => Err(WorkloadError::InvalidSettings(format!(
                "unknown game mode '{}' (expected CREATIVE, SURVIVAL, SPECTATOR or ADVENTURE)",
                other
            ))),
        }
    }
}

/// Fixed, per-deployment parameters of every tenant workload
///
/// One workload per tenant and a fixed host port: a host runs one published
/// server at a time per port, which caps density at one tenant per host port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSettings {
    pub image: String,
    pub server_type: String,
    pub server_version: String,
    pub game_mode: GameMode,
    pub host_ip: String,
    pub host_port: u16,
    pub container_port: u16,
    pub data_path: String,
    pub name_prefix: String,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        WorkloadSettings {
            image: dmc_config::DEFAULT_IMAGE.to_string(),
            server_type: dmc_config::DEFAULT_SERVER_TYPE.to_string(),
            server_version: dmc_config::DEFAULT_SERVER_VERSION.to_string(),
            game_mode: GameMode::Creative,
            host_ip: dmc_config::DEFAULT_HOST_IP.to_string(),
            host_port: dmc_config::DEFAULT_SERVICE_PORT,
            container_port: dmc_config::DEFAULT_SERVICE_PORT,
            data_path: dmc_config::DEFAULT_DATA_PATH.to_string(),
            name_prefix: dmc_config::DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

impl WorkloadSettings {
    pub fn from_config(config: &Config) -> Result<Self, WorkloadError> {
        let settings = WorkloadSettings {
            image: config.get_image(),
            server_type: config.get_server_type(),
            server_version: config.get_server_version(),
            game_mode: config.get_game_mode().parse()?,
            host_ip: config.get_host_ip(),
            host_port: config.get_host_port(),
            container_port: config.get_container_port(),
            data_path: config.get_data_path(),
            name_prefix: config.get_name_prefix(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), WorkloadError> {
        if self.image.trim().is_empty() {
            return Err(WorkloadError::InvalidSettings("image is empty".to_string()));
        }
        if !self.data_path.starts_with('/') {
            return Err(WorkloadError::InvalidSettings(format!(
                "data path must be absolute inside the workload: {}",
                self.data_path
            )));
        }
        let prefix_ok = !self.name_prefix.is_empty()
            && self
                .name_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !prefix_ok {
            return Err(WorkloadError::InvalidSettings(format!(
                "name prefix must be non-empty and use [A-Za-z0-9_.-]: '{}'",
                self.name_prefix
            )));
        }
        if self.host_port == 0 || self.container_port == 0 {
            return Err(WorkloadError::InvalidSettings("ports must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Deterministic runtime name, so a second create for a tenant collides
    pub fn workload_name(&self, tenant: &TenantId) -> String {
        format!("{}-{}", self.name_prefix, tenant)
    }

    pub fn environment(&self) -> Vec<(String, String)> {
        vec![
            ("EULA".to_string(), "TRUE".to_string()),
            ("TYPE".to_string(), self.server_type.clone()),
            ("VERSION".to_string(), self.server_version.clone()),
            ("MODE".to_string(), self.game_mode.to_string()),
        ]
    }

    pub fn build_spec(&self, tenant: &TenantId, storage_root: &Path) -> WorkloadSpec {
        WorkloadSpec {
            name: self.workload_name(tenant),
            image: self.image.clone(),
            env: self.environment(),
            mounts: vec![BindMount {
                source: storage_root.to_path_buf(),
                target: self.data_path.clone(),
            }],
            ports: vec![PortBinding {
                host_ip: self.host_ip.clone(),
                host_port: self.host_port,
                container_port: self.container_port,
                protocol: Protocol::Tcp,
            }],
            restart_policy: RESTART_POLICY.to_string(),
            log_driver: LOG_DRIVER.to_string(),
        }
    }
}
