use clap::Args;
use dmc_config::Config;
use std::path::PathBuf;

use crate::errors::ProvisionError;
use crate::provision::{read_upload, CreateRequest, CreateResponse, Provisioner};

#[derive(Args, Debug, Clone)]
pub struct CreateCommand {
    /// Primary plugin archive
    #[arg(long, value_name = "FILE")]
    pub plugin: PathBuf,

    /// Dependency archive; repeat for each one
    #[arg(short = 'd', long = "dependency", value_name = "FILE")]
    pub dependencies: Vec<PathBuf>,

    /// Use this tenant id instead of generating one
    #[arg(long, value_name = "UUID")]
    pub tenant: Option<String>,
}

pub fn handle_create(cmd: CreateCommand, config: &Config) -> Result<CreateResponse, ProvisionError> {
    let provisioner = Provisioner::from_config(config)?;
    let limit = provisioner.max_archive_bytes();

    let primary = read_upload(&cmd.plugin, limit)?;
    let dependencies = cmd
        .dependencies
        .iter()
        .map(|path| read_upload(path, limit))
        .collect::<Result<Vec<_>, _>>()?;
    dmc_logger::debug(&format!(
        "Read {} ({} bytes) and {} dependency archive(s)",
        primary.display_name,
        primary.size(),
        dependencies.len()
    ));

    dmc_logger::spinner_start(&format!("Provisioning {}", primary.display_name));
    let result = provisioner.create(CreateRequest {
        tenant_hint: cmd.tenant,
        primary,
        dependencies,
    });
    match &result {
        Ok(response) => {
            dmc_logger::spinner_success(&format!("Workload started for tenant {}", response.tenant_id));
            for failure in &response.persist_failures {
                dmc_logger::warn(&format!(
                    "{} {} was not persisted: {}",
                    failure.name, failure.version, failure.reason
                ));
            }
        }
        Err(_) => dmc_logger::spinner_error("Provisioning failed"),
    }
    result
}
