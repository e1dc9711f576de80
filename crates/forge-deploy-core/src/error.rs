//! Error types and error handling for Forge deployments

use thiserror::Error;

/// Result type alias using ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Custom error types for environment resolution and deployments
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("No .forge config file found in this directory or any parent")]
    ConfigNotFound,

    #[error("{}", unknown_environment_message(.name, .available))]
    UnknownEnvironment { name: String, available: Vec<String> },

    #[error("Server ID is required for environment '{name}'")]
    MissingServer { name: String },

    #[error("Config does not use named environments")]
    NotEnvironmentShaped,

    #[error("No site named '{name}' on server {server}")]
    SiteNotFound { name: String, server: u64 },

    #[error("Site {site} is already deploying")]
    AlreadyDeploying { site: u64 },

    #[error("The deployment failed (deployment {deployment_id})")]
    DeploymentFailed { deployment_id: u64 },

    #[error("Deployment did not finish within {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("Forge API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HTTP(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    General(#[from] anyhow::Error),
}

fn unknown_environment_message(name: &str, available: &[String]) -> String {
    if available.is_empty() {
        format!("Environment '{name}' specified but no environments are configured in .forge")
    } else {
        format!(
            "Unknown environment '{name}'. Available: {}",
            available.join(", ")
        )
    }
}

/// Handle and display errors with helpful messages
pub fn handle_error(error: &ForgeError) {
    eprintln!("✗ Error: {}", error);

    // If DEBUG environment variable is set, show detailed info
    if std::env::var("DEBUG").is_ok() {
        if let Some(source) = std::error::Error::source(error) {
            eprintln!("\nDetails:");
            eprintln!("{:?}", source);
        }
    }

    match error {
        ForgeError::ConfigNotFound => {
            eprintln!("\nTips:");
            eprintln!("  • Run `forge-deploy init` to create one");
            eprintln!("  • Or add an environment: forge-deploy config set <name> <server-id> <site-id>");
        }
        ForgeError::MissingServer { .. } => {
            eprintln!("\nUsage:");
            eprintln!("  forge-deploy config set <name> <server-id> [site-id]");
        }
        ForgeError::NotEnvironmentShaped => {
            eprintln!("\nTips:");
            eprintln!("  • Run `forge-deploy config set <name> <server> <site>` first");
        }
        ForgeError::Configuration(_) => {
            eprintln!("\nTips:");
            eprintln!("  • Check the settings file: ~/.config/forge-deploy/config.json");
            eprintln!("  • Or set FORGE_API_TOKEN in your environment");
        }
        ForgeError::Api { status: 401, .. } => {
            eprintln!("\nTips:");
            eprintln!("  • Your API token was rejected; generate a new one in Forge");
        }
        _ => {}
    }
}
