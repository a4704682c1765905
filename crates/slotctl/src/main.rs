mod commands;
mod config;
mod error;

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};
use slot_allocator::AllocError;
use std::io::Write;

/// Manage web-result slots of a tenant's pages
#[derive(Debug, Parser)]
#[command(name = "slotctl", version, about)]
struct Cli {
    /// Tenant (site) to operate on
    #[arg(short, long, default_value = "FastMoney")]
    tenant: String,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() {
    // Initialize logger - defaults to RUST_LOG if set, otherwise INFO
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => exit_with_error(e),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::Config::from_env()?;
    let tenants = match &config.config_file {
        Some(path) => {
            debug!("Loading tenant profiles from {}", path.display());
            slot_allocator::Config::load_from_file(path)?
        }
        None => slot_allocator::Config::builtin(),
    };
    let profile = tenants.tenant(&cli.tenant)?.clone();
    info!("Tenant: {} (slots 0-{})", profile.name, profile.slot_width - 1);

    let mut workspace = commands::Workspace::open(&config, profile)?;
    workspace.run(cli.command)
}

fn exit_with_error(e: anyhow::Error) -> ! {
    error!("Error: {e}");

    // Provide helpful hints for common errors
    for cause in e.chain() {
        if let Some(alloc) = cause.downcast_ref::<AllocError>() {
            match alloc {
                AllocError::SlotTaken { .. } => {
                    error!("Hint: pass --force to replace it, or choose a free slot (see `slotctl map`).");
                    break;
                }
                AllocError::DependencyDelete { .. } => {
                    error!("Hint: nothing was changed; retry once the click records can be deleted.");
                    break;
                }
                AllocError::SlotsExhausted { .. } => {
                    error!("Hint: nothing was added; use a lower --start-from.");
                    break;
                }
                AllocError::UnknownTenant(_) => {
                    error!("Hint: check --tenant or the profiles in SLOTCTL_CONFIG.");
                    break;
                }
                _ => {}
            }
        }
        if let Some(ioe) = cause.downcast_ref::<std::io::Error>()
            && ioe.kind() == std::io::ErrorKind::PermissionDenied
        {
            error!("Hint: set SLOTCTL_DATA_DIR or SLOTCTL_EXPORT_DIR to a writable directory.");
            break;
        }
    }
    let _ = std::io::stderr().flush();
    std::process::exit(1);
}
