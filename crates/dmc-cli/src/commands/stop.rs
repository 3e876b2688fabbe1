use clap::Args;
use dmc_config::Config;

use crate::errors::ProvisionError;
use crate::provision::{Provisioner, StopRequest, StopResponse};

#[derive(Args, Debug, Clone)]
pub struct StopCommand {
    /// Tenant id printed by `dmc create`
    #[arg(value_name = "UUID")]
    pub tenant: String,
}

pub fn handle_stop(cmd: StopCommand, config: &Config) -> Result<StopResponse, ProvisionError> {
    let provisioner = Provisioner::from_config(config)?;

    dmc_logger::spinner_start(&format!("Stopping tenant {}", cmd.tenant));
    let result = provisioner.stop(StopRequest {
        tenant_id: cmd.tenant,
    });
    match &result {
        Ok(response) => dmc_logger::spinner_success(&format!("Tenant {} stopped", response.tenant_id)),
        Err(_) => dmc_logger::spinner_error("Stop failed"),
    }
    result
}
