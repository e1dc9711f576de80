//! Forge Deploy CLI - deploy Forge sites from a project directory
//!
//! This CLI provides tools for:
//! - Deploying to named environments from a local `.forge` file
//! - Creating and editing that file
//! - Following a deployment until it finishes

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;

use commands::{config, deploy, init, version};
use forge_deploy_core::{AppConfig, ForgeError, LocalConfigStore};

#[derive(Parser)]
#[command(name = "forge-deploy")]
#[command(author = "Forge Deploy Team")]
#[command(version)]
#[command(about = "Deploy Forge sites to named environments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a site
    Deploy(deploy::DeployCommand),

    /// Initialize a .forge config file in the current directory
    Init(init::InitCommand),

    /// Display or edit the local .forge configuration
    Config(config::ConfigCommand),

    /// Show version information
    Version(version::VersionCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let settings = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} Failed to load settings: {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    let mut store = match LocalConfigStore::from_current_dir() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} Failed to read the working directory: {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    tracing::debug!("Working directory: {}", store.start_dir().display());

    // Execute command
    let result = match cli.command {
        Some(Commands::Deploy(cmd)) => cmd.execute(&settings, &store, cli.json).await,
        Some(Commands::Init(cmd)) => cmd.execute(&settings, &mut store).await,
        Some(Commands::Config(cmd)) => cmd.execute(&mut store, cli.json),
        Some(Commands::Version(cmd)) => cmd.execute(),
        None => {
            // Show help by default
            println!("{}", "Forge Deploy".bold());
            println!();
            println!("Run {} for usage", "forge-deploy --help".cyan());
            Ok(())
        }
    };

    if let Err(e) = result {
        let error = e
            .downcast::<ForgeError>()
            .unwrap_or_else(ForgeError::General);
        forge_deploy_core::handle_error(&error);
        std::process::exit(1);
    }

    Ok(())
}
