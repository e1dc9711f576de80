//! forge-deploy-core - Core library for the Forge deploy CLI
//!
//! This crate provides:
//! - Local `.forge` config discovery and persistence
//! - Named environment resolution and mutation
//! - Deploy target selection
//! - Confirmation policy for protected environments
//! - Forge API client
//! - Deployment orchestration (trigger, poll, classify, summarize)

pub mod config;
pub mod confirmation;
pub mod deployment;
pub mod environments;
pub mod error;
pub mod forge;
pub mod local_config;
pub mod target;
pub mod utils;

// Re-exports for convenience
pub use config::AppConfig;
pub use confirmation::{display_name, requires_confirmation, ConfirmationRequest};
pub use deployment::{
    classify, summarize, Deployer, DeploymentObserver, DeploymentPhase, DeploymentReport,
    DeploymentSession, DeploymentSummary, Outcome, SessionStatus,
};
pub use environments::{
    EnvironmentEntry, EnvironmentUpdate, RawConfig, RemovalOutcome, ResolvedEnvironment,
    UpsertOutcome,
};
pub use error::{handle_error, ForgeError, Result};
pub use forge::{DeploymentApi, DeploymentRecord, ForgeClient, Server, Site};
pub use local_config::{LocalConfigStore, SaveOutcome, CONFIG_FILE};
pub use target::{select_target, DeployTarget, TargetRequest};
pub use utils::expand_tilde;
