//! Version command - show version information

use anyhow::Result;
use clap::Args;
use colored::*;
use forge_deploy_core::CONFIG_FILE;

#[derive(Args)]
pub struct VersionCommand;

impl VersionCommand {
    pub fn execute(&self) -> Result<()> {
        println!("{} {}", "Forge Deploy".bold(), env!("CARGO_PKG_VERSION").green());
        println!();
        println!("  {} {}", "Config file:".cyan(), CONFIG_FILE);
        println!("  {} {}", "Platform:".cyan(), std::env::consts::OS);

        Ok(())
    }
}
