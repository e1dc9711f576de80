//! Init command - interactively create a .forge file

use anyhow::Result;
use clap::Args;
use colored::*;
use forge_deploy_core::environments::{confirm_by_default, suggest_default};
use forge_deploy_core::{
    AppConfig, EnvironmentEntry, ForgeClient, LocalConfigStore, RawConfig, CONFIG_FILE,
};

use crate::prompt;

#[derive(Args)]
pub struct InitCommand {
    /// Overwrite an existing .forge file without asking
    #[arg(long)]
    force: bool,

    /// Create a simple config without named environments
    #[arg(long)]
    simple: bool,
}

impl InitCommand {
    pub async fn execute(&self, settings: &AppConfig, store: &mut LocalConfigStore) -> Result<()> {
        let existing = store.start_dir().join(CONFIG_FILE);

        if existing.exists()
            && !self.force
            && !prompt::confirm(
                &format!("A {} file already exists. Would you like to overwrite it?", CONFIG_FILE),
                false,
            )?
        {
            return Ok(());
        }

        prompt::step("Setting up local Forge configuration");
        println!();

        let client = ForgeClient::from_config(settings)?;
        let config = if self.simple {
            simple_config(&client).await?
        } else {
            environment_config(&client).await?
        };

        let directory = store.start_dir().to_path_buf();
        store.write(&directory, &config)?;

        println!();
        prompt::success(&format!("Created {}", CONFIG_FILE));
        println!();
        print_summary(&config);

        Ok(())
    }
}

async fn simple_config(client: &ForgeClient) -> Result<RawConfig> {
    let server = prompt::ask_for_server(client, "Which server should this project use").await?;

    let mut config = RawConfig {
        server: Some(server),
        ..Default::default()
    };

    if let Some(site) = prompt::ask_for_site(client, server, "Which site should this project use").await? {
        config.site = Some(site);
        config.confirm = prompt::confirm("Require confirmation before deploying?", true)?;
    }

    Ok(config)
}

async fn environment_config(client: &ForgeClient) -> Result<RawConfig> {
    let mut config = RawConfig::default();

    loop {
        let is_first = !config.has_environments();
        if let Some((name, entry)) = configure_environment(client, is_first).await? {
            config.upsert(&name, entry);
            prompt::success(&format!("Added environment: {}", name));
            println!();
        }

        let count = config.environment_names().len();
        if count == 0 {
            anyhow::bail!("No environments configured. Aborting.");
        }
        if !prompt::confirm("Add another environment?", count < 2)? {
            break;
        }
    }

    let names = config.environment_names();
    if names.len() > 1 {
        let suggested = config
            .environments
            .as_ref()
            .and_then(suggest_default)
            .and_then(|name| names.iter().position(|n| *n == name))
            .unwrap_or(0);
        let index = prompt::choose("Which environment should be the default", &names, suggested)?;
        config.set_default(&names[index])?;
    }

    Ok(config)
}

async fn configure_environment(
    client: &ForgeClient,
    is_first: bool,
) -> Result<Option<(String, EnvironmentEntry)>> {
    let (question, default) = if is_first {
        ("Environment name (e.g., production, staging)", Some("production"))
    } else {
        ("Environment name", None)
    };

    let name = prompt::ask(question, default)?.trim().to_lowercase();
    if name.is_empty() {
        return Ok(None);
    }

    println!();
    prompt::step(&format!("Configuring {} environment", name));

    let server = prompt::ask_for_server(client, &format!("Which server for '{}'", name)).await?;
    let site = prompt::ask_for_site(client, server, &format!("Which site for '{}'", name)).await?;
    let confirm = prompt::confirm(
        &format!("Require confirmation before deploying to {}?", name),
        confirm_by_default(&name),
    )?;

    Ok(Some((name, EnvironmentEntry::new(server, site).with_confirm(confirm))))
}

fn print_summary(config: &RawConfig) {
    if let Some(environments) = &config.environments {
        println!("  {}", "Environments:".yellow());
        for (name, entry) in environments {
            let default = if config.default_environment() == Some(name.as_str()) {
                " (default)".green().to_string()
            } else {
                String::new()
            };
            let confirm = if entry.confirm {
                " [confirm]".yellow().to_string()
            } else {
                String::new()
            };
            println!("    - {}{}{}", name, default, confirm);
        }
        println!();
        prompt::step("Usage:");
        println!("  {}            Deploy to default environment", "forge-deploy deploy".yellow());
        println!("  {}    Deploy to specific environment", "forge-deploy deploy staging".yellow());
        println!("  {}    Skip confirmation prompt", "forge-deploy deploy --force".yellow());
    } else {
        if let Some(server) = config.server {
            println!("  {}  {}", "Server:".yellow(), server);
        }
        if let Some(site) = config.site {
            println!("  {}    {}", "Site:".yellow(), site);
        }
        if config.confirm {
            println!("  {} Yes", "Confirm:".yellow());
        }
        println!();
        prompt::step("You can now run `forge-deploy deploy` from this directory");
    }
}
