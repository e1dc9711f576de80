//! Deploy command - resolve the target, confirm, deploy, report

use anyhow::Result;
use clap::Args;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Table};
use forge_deploy_core::{
    select_target, AppConfig, ConfirmationRequest, DeployTarget, Deployer, DeploymentObserver,
    DeploymentPhase, DeploymentReport, ForgeClient, LocalConfigStore, Outcome,
    ResolvedEnvironment, TargetRequest,
};

use crate::prompt;

#[derive(Args)]
pub struct DeployCommand {
    /// Environment name (e.g. staging, production) or site name
    target: Option<String>,

    /// Environment to deploy; must exist in .forge
    #[arg(short, long = "env")]
    environment: Option<String>,

    /// Explicit site name or id (bypasses environment detection)
    #[arg(long)]
    site: Option<String>,

    /// Server id to use with a site name
    #[arg(long)]
    server: Option<u64>,

    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,
}

impl DeployCommand {
    pub async fn execute(&self, settings: &AppConfig, store: &LocalConfigStore, json: bool) -> Result<()> {
        let config = store.load();
        let request = TargetRequest {
            target: self.target.as_deref(),
            environment: self.environment.as_deref(),
            site: self.site.as_deref(),
        };

        match select_target(config, request)? {
            DeployTarget::Environment(resolved) => {
                self.deploy_to_environment(settings, &resolved, json).await
            }
            DeployTarget::Site(name) => {
                // A governing config still supplies the server for bare site names
                let config_server = config.resolve(None).map(|r| r.server_id());
                self.deploy_to_site(settings, name.as_deref(), config_server, json)
                    .await
            }
        }
    }

    async fn deploy_to_environment(
        &self,
        settings: &AppConfig,
        resolved: &ResolvedEnvironment,
        json: bool,
    ) -> Result<()> {
        if let Some(request) = ConfirmationRequest::for_action("deploy", Some(resolved), self.force) {
            println!();
            println!("  {}", request.warning().red().bold());
            println!();
            if !prompt::confirm(&request.question(), false)? {
                prompt::warn("Deployment cancelled.");
                return Ok(());
            }
        }

        let label = resolved
            .name
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_else(|| "the configured".to_string());
        prompt::step(&format!("Deploying to {} environment", label));

        let Some(site_id) = resolved.site_id() else {
            anyhow::bail!(
                "No site configured for environment '{}'",
                resolved.name.as_deref().unwrap_or("default")
            );
        };

        let client = ForgeClient::from_config(settings)?;
        self.run(settings, &client, resolved.server_id(), site_id, json)
            .await
    }

    async fn deploy_to_site(
        &self,
        settings: &AppConfig,
        site: Option<&str>,
        config_server: Option<u64>,
        json: bool,
    ) -> Result<()> {
        let client = ForgeClient::from_config(settings)?;

        let server_id = match self.server.or(config_server) {
            Some(id) => id,
            None => prompt::ask_for_server(&client, "Which server is the site on").await?,
        };

        let site_id = match site {
            Some(name) => client.resolve_site(server_id, name).await?,
            None => prompt::ask_for_site(&client, server_id, "Which site would you like to deploy")
                .await?
                .ok_or_else(|| anyhow::anyhow!("Server {} has no sites", server_id))?,
        };

        self.run(settings, &client, server_id, site_id, json).await
    }

    async fn run(
        &self,
        settings: &AppConfig,
        client: &ForgeClient,
        server_id: u64,
        site_id: u64,
        json: bool,
    ) -> Result<()> {
        let deployer = Deployer::new(client)
            .with_poll_interval(settings.poll_interval())
            .with_timeout(settings.deploy_timeout());

        let mut progress = ConsoleProgress { quiet: json };
        let report = deployer.deploy(server_id, site_id, &mut progress).await?;

        print_report(&report, json)
    }
}

/// Prints lifecycle steps and the deployment log
struct ConsoleProgress {
    quiet: bool,
}

impl DeploymentObserver for ConsoleProgress {
    fn phase(&mut self, phase: DeploymentPhase) {
        if self.quiet {
            return;
        }
        match phase {
            DeploymentPhase::Queuing => prompt::step("Queuing Deployment"),
            DeploymentPhase::WaitingForStart => prompt::step("Waiting For Deployment To Start"),
            DeploymentPhase::Deploying => prompt::step("Deploying"),
            DeploymentPhase::Finished(Outcome::Failed) => {
                println!("{} {}", "✗".red().bold(), "Deployment finished with errors".red());
            }
            DeploymentPhase::Finished(Outcome::Succeeded) => {}
        }
    }

    fn output(&mut self, lines: &[String]) {
        // The log is always shown, even in JSON mode, so failures stay diagnosable
        for line in lines {
            eprintln!("  {} {}", "▕".dimmed(), line);
        }
    }
}

fn print_report(report: &DeploymentReport, json: bool) -> Result<()> {
    let summary = &report.summary;

    if json {
        let value = serde_json::json!({
            "deployment_id": summary.deployment_id,
            "site_url": summary.site_url,
            "duration_seconds": summary.duration_seconds,
            "status": report.session.status,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let elapsed = summary
        .duration_seconds
        .map(|secs| format!(" ({}s)", secs))
        .unwrap_or_default();
    println!();
    println!(
        "{} {}{}",
        "✓".green().bold(),
        "Site Deployed Successfully.".bold(),
        elapsed.dimmed()
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Deployment ID", "Site URL"]);
    table.add_row(vec![summary.deployment_id.to_string(), summary.site_url.clone()]);
    println!("{table}");

    Ok(())
}
