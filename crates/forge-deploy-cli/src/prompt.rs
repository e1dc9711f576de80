//! Interactive prompts

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, Select};
use forge_deploy_core::{ForgeClient, Server};

/// Print a step heading
pub fn step(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn confirm(question: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(question)
        .default(default)
        .interact()
        .context("Failed to read confirmation")
}

/// Free-text answer; an empty answer is returned as an empty string
pub fn ask(question: &str, default: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new()
        .with_prompt(question)
        .allow_empty(true);
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    input.interact_text().context("Failed to read answer")
}

pub fn choose(question: &str, items: &[String], default: usize) -> Result<usize> {
    Select::new()
        .with_prompt(question)
        .items(items)
        .default(default)
        .interact()
        .context("Failed to read selection")
}

fn server_label(server: &Server) -> String {
    match &server.ip_address {
        Some(ip) => format!("{} ({})", server.name, ip),
        None => server.name.clone(),
    }
}

/// Pick a server from the account
pub async fn ask_for_server(client: &ForgeClient, question: &str) -> Result<u64> {
    let servers = client.servers().await?;
    anyhow::ensure!(!servers.is_empty(), "No servers found on this Forge account");

    let labels: Vec<String> = servers.iter().map(server_label).collect();
    let index = choose(question, &labels, 0)?;
    Ok(servers[index].id)
}

/// Pick a site on `server_id`; `None` when the server has no sites
pub async fn ask_for_site(client: &ForgeClient, server_id: u64, question: &str) -> Result<Option<u64>> {
    let sites = client.sites(server_id).await?;
    if sites.is_empty() {
        return Ok(None);
    }

    let labels: Vec<String> = sites.iter().map(|s| s.name.clone()).collect();
    let index = choose(question, &labels, 0)?;
    Ok(Some(sites[index].id))
}
