//! Deciding what a `deploy` invocation points at

use crate::environments::{RawConfig, ResolvedEnvironment};
use crate::error::Result;

/// What the user asked to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployTarget {
    /// A configured environment (or the anonymous simple config)
    Environment(ResolvedEnvironment),
    /// A site by name or id, bypassing environments; `None` means ask
    Site(Option<String>),
}

/// Raw deploy arguments as given on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetRequest<'a> {
    /// Positional target: an environment name or a site name
    pub target: Option<&'a str>,
    /// `--env`: must name a configured environment
    pub environment: Option<&'a str>,
    /// `--site`: explicit site, skips environment detection
    pub site: Option<&'a str>,
}

/// Pick the deploy target.
///
/// Precedence:
/// 1. `--site` always wins
/// 2. `--env` must resolve, otherwise `UnknownEnvironment`
/// 3. a positional target that names an environment
/// 4. any other positional target is a site name
/// 5. the default environment, or the simple config
/// 6. nothing configured: ask for a site
pub fn select_target(config: &RawConfig, request: TargetRequest<'_>) -> Result<DeployTarget> {
    if let Some(site) = request.site {
        return Ok(DeployTarget::Site(Some(site.to_string())));
    }

    if let Some(name) = request.environment {
        if let Some(resolved) = config.resolve_required(Some(name))? {
            return Ok(DeployTarget::Environment(resolved));
        }
    }

    if let Some(target) = request.target {
        if config.is_environment_name(target) {
            if let Some(resolved) = config.resolve(Some(target)) {
                return Ok(DeployTarget::Environment(resolved));
            }
        }
        return Ok(DeployTarget::Site(Some(target.to_string())));
    }

    Ok(match config.resolve(None) {
        Some(resolved) => DeployTarget::Environment(resolved),
        None => DeployTarget::Site(None),
    })
}
