//! Confirmation policy for destructive actions against an environment

use crate::environments::ResolvedEnvironment;

/// Shown when the governing config has no environment name
const UNNAMED_ENVIRONMENT: &str = "this environment";

/// Whether `action` against `resolved` must be confirmed interactively.
///
/// `force` always wins. No governing config means nothing to confirm.
pub fn requires_confirmation(resolved: Option<&ResolvedEnvironment>, force: bool) -> bool {
    if force {
        return false;
    }

    resolved.is_some_and(|env| env.config.confirm)
}

/// Upper-cased name to present in prompts
pub fn display_name(resolved: Option<&ResolvedEnvironment>) -> String {
    resolved
        .and_then(|env| env.name.as_deref())
        .unwrap_or(UNNAMED_ENVIRONMENT)
        .to_uppercase()
}

/// A confirmation the caller has to obtain before proceeding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub action: String,
    pub environment: String,
}

impl ConfirmationRequest {
    /// `None` when no confirmation is needed
    pub fn for_action(
        action: &str,
        resolved: Option<&ResolvedEnvironment>,
        force: bool,
    ) -> Option<Self> {
        requires_confirmation(resolved, force).then(|| Self {
            action: action.to_string(),
            environment: display_name(resolved),
        })
    }

    pub fn warning(&self) -> String {
        format!("WARNING: You are about to {} to {}", self.action, self.environment)
    }

    pub fn question(&self) -> String {
        format!("Are you sure you want to {} to {}?", self.action, self.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::EnvironmentEntry;

    fn production(confirm: bool) -> ResolvedEnvironment {
        ResolvedEnvironment {
            name: Some("production".to_string()),
            config: EnvironmentEntry::new(1, Some(20)).with_confirm(confirm),
        }
    }

    #[test]
    fn test_force_always_skips_confirmation() {
        assert!(!requires_confirmation(Some(&production(true)), true));
        assert!(!requires_confirmation(Some(&production(false)), true));
        assert!(!requires_confirmation(None, true));
    }

    #[test]
    fn test_environment_policy_decides() {
        assert!(requires_confirmation(Some(&production(true)), false));
        assert!(!requires_confirmation(Some(&production(false)), false));
    }

    #[test]
    fn test_no_config_needs_no_confirmation() {
        assert!(!requires_confirmation(None, false));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Some(&production(true))), "PRODUCTION");

        let anonymous = ResolvedEnvironment {
            name: None,
            config: EnvironmentEntry::new(1, None).with_confirm(true),
        };
        assert_eq!(display_name(Some(&anonymous)), "THIS ENVIRONMENT");
    }

    #[test]
    fn test_request_text() {
        let request = ConfirmationRequest::for_action("deploy", Some(&production(true)), false).unwrap();
        assert_eq!(request.warning(), "WARNING: You are about to deploy to PRODUCTION");
        assert_eq!(request.question(), "Are you sure you want to deploy to PRODUCTION?");

        assert_eq!(
            ConfirmationRequest::for_action("deploy", Some(&production(true)), true),
            None
        );
    }
}
