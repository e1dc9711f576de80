//! Config commands - show and edit the local .forge file

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use forge_deploy_core::{EnvironmentUpdate, LocalConfigStore, RawConfig, SaveOutcome};

use crate::prompt;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommand>,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or update an environment
    Set(SetCommand),

    /// Remove an environment
    Remove(RemoveCommand),

    /// Set the default environment
    Default(DefaultCommand),
}

#[derive(Args)]
struct SetCommand {
    /// Environment name (e.g., production, staging)
    name: String,

    /// Server ID
    server: Option<u64>,

    /// Site ID
    site: Option<u64>,

    /// Require confirmation before deploying
    #[arg(long, conflicts_with = "no_confirm")]
    confirm: bool,

    /// Disable confirmation requirement
    #[arg(long)]
    no_confirm: bool,
}

#[derive(Args)]
struct RemoveCommand {
    /// Environment name to remove
    name: String,

    /// Skip confirmation
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct DefaultCommand {
    /// Environment name to set as default
    name: String,
}

impl ConfigCommand {
    pub fn execute(&self, store: &mut LocalConfigStore, json: bool) -> Result<()> {
        match &self.command {
            None => show(store, json),
            Some(ConfigSubcommand::Set(cmd)) => cmd.execute(store),
            Some(ConfigSubcommand::Remove(cmd)) => cmd.execute(store),
            Some(ConfigSubcommand::Default(cmd)) => cmd.execute(store),
        }
    }
}

fn show(store: &LocalConfigStore, json: bool) -> Result<()> {
    let path = store.require_path()?;
    let config = store.load();

    if json {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    prompt::step(&format!("Config: {}", path.display()));
    println!();

    if config.has_environments() {
        print_environments(config);
    } else {
        print_simple(config);
    }

    println!();
    println!("  {}", "Commands:".dimmed());
    println!("    {}  Add/update environment", "forge-deploy config set <name> <server> <site>".yellow());
    println!("    {}        Toggle confirmation", "forge-deploy config set <name> --confirm".yellow());
    println!("    {}               Remove environment", "forge-deploy config remove <name>".yellow());
    println!("    {}              Set default environment", "forge-deploy config default <name>".yellow());

    Ok(())
}

fn print_environments(config: &RawConfig) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Environment", "Server", "Site", "Confirm", "Default"]);

    for (name, entry) in config.environments.iter().flatten() {
        let is_default = config.default_environment() == Some(name.as_str());
        let name_cell = if is_default {
            Cell::new(name).fg(Color::Green)
        } else {
            Cell::new(name)
        };
        let confirm_cell = if entry.confirm {
            Cell::new("yes").fg(Color::Yellow)
        } else {
            Cell::new("no")
        };

        table.add_row(vec![
            name_cell,
            Cell::new(entry.server),
            Cell::new(entry.site.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())),
            confirm_cell,
            Cell::new(if is_default { "*" } else { "" }).fg(Color::Green),
        ]);
    }

    println!("{table}");
}

fn print_simple(config: &RawConfig) {
    let or_dash = |id: Option<u64>| id.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());

    println!("  {}  {}", "Server:".yellow(), or_dash(config.server));
    println!("  {}    {}", "Site:".yellow(), or_dash(config.site));
    println!(
        "  {} {}",
        "Confirm:".yellow(),
        if config.confirm { "yes".yellow() } else { "no".normal() }
    );
}

impl SetCommand {
    fn execute(&self, store: &mut LocalConfigStore) -> Result<()> {
        let name = self.name.trim().to_lowercase();

        if store.is_malformed() {
            if let Some(path) = store.locate() {
                prompt::warn(&format!(
                    "{} could not be parsed; saving will replace its contents",
                    path.display()
                ));
            }
            if !prompt::confirm("Continue anyway?", false)? {
                return Ok(());
            }
        }

        let mut config = store.load().clone();

        let legacy = config.simple_entry();
        let update = EnvironmentUpdate {
            server: self.server,
            site: self.site,
            confirm: if self.confirm {
                Some(true)
            } else if self.no_confirm {
                Some(false)
            } else {
                None
            },
        };

        let outcome = config.apply_update(&name, update)?;

        // Offer to keep the old single-target config as a named environment
        if let Some(entry) = legacy {
            let legacy_name = prompt::ask("Existing simple config found. Name for it?", Some("legacy"))?
                .trim()
                .to_lowercase();
            if !legacy_name.is_empty() && legacy_name != name {
                config.upsert(&legacy_name, entry);
            }
        }

        let saved = store.save(&config)?;

        let action = if outcome.created { "Added" } else { "Updated" };
        prompt::success(&format!("{} environment: {}", action, name));
        if let SaveOutcome::Written(path) = &saved {
            println!("  {} {}", "File:".dimmed(), path.display());
        }

        let entry = &outcome.entry;
        println!();
        println!("  {}  {}", "Server:".yellow(), entry.server);
        if let Some(site) = entry.site {
            println!("  {}    {}", "Site:".yellow(), site);
        }
        println!("  {} {}", "Confirm:".yellow(), if entry.confirm { "yes" } else { "no" });

        Ok(())
    }
}

impl RemoveCommand {
    fn execute(&self, store: &mut LocalConfigStore) -> Result<()> {
        store.require_path()?;
        let name = self.name.trim().to_lowercase();

        let mut config = store.load().clone();
        let outcome = config.remove(&name)?;

        if !self.force && !prompt::confirm(&format!("Remove environment {}?", name), false)? {
            return Ok(());
        }

        match store.save(&config)? {
            SaveOutcome::Deleted(_) => {
                prompt::success("Removed last environment. Config file deleted.");
            }
            SaveOutcome::Written(_) => {
                if let Some(new_default) = &outcome.new_default {
                    prompt::warn(&format!("Default changed to {}", new_default));
                }
                prompt::success(&format!("Removed environment: {}", name));
            }
        }

        Ok(())
    }
}

impl DefaultCommand {
    fn execute(&self, store: &mut LocalConfigStore) -> Result<()> {
        store.require_path()?;
        let name = self.name.trim().to_lowercase();

        let mut config = store.load().clone();
        config.set_default(&name)?;

        store.save(&config)?;
        prompt::success(&format!("Default environment set to: {}", name));

        Ok(())
    }
}
