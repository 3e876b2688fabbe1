use anyhow::Context;
use clap::{Parser, Subcommand};
use dmc::{
    commands::{
        self,
        config::{self, ConfigAction},
        create::{self, CreateCommand},
        stop::{self, StopCommand},
    },
    errors::ProvisionError,
    GlobalOpts,
};
use dmc_config::Config;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dmc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Per-tenant game-server provisioning",
    long_about = "dmc resolves uploaded plugin archives and runs one game-server workload per tenant."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure dmc
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Resolve plugins and start a workload for a tenant
    Create(CreateCommand),
    /// Remove a tenant's workload and storage
    Stop(StopCommand),
}

fn init_tracing(no_stdout: bool) -> anyhow::Result<()> {
    let default_level = if no_stdout {
        "off".to_string()
    } else {
        dmc_logger::verbosity_to_filter()
    };
    let default_filter = format!(
        "dmc={0},dmc_manifest={0},dmc_workload={0}",
        default_level
    );

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Load the config, run a provisioning command and print its JSON result
fn with_config<T: Serialize>(run: impl FnOnce(&Config) -> Result<T, ProvisionError>) -> i32 {
    let result = Config::load()
        .map_err(ProvisionError::from)
        .and_then(|config| run(&config));
    commands::emit(&result)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dmc_logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.no_stdout)
    {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    if let Err(e) = init_tracing(cli.global.no_stdout) {
        eprintln!("Warning: {:#}", e);
    }

    let code = match cli.command {
        Commands::Config { action } => {
            config::handle_config(action, cli.global);
            0
        }
        Commands::Create(cmd) => with_config(|config| create::handle_create(cmd, config)),
        Commands::Stop(cmd) => with_config(|config| stop::handle_stop(cmd, config)),
    };
    if code != 0 {
        dmc_logger::show_log_path();
        std::process::exit(code);
    }
}
