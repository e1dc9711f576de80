//! Named deployment environments stored in the local `.forge` file
//!
//! A config is either *simple* (`{server, site?, confirm?}`, one anonymous
//! target) or *environment-shaped* (`{default?, environments: {...}}`).
//! The presence of the `environments` key decides which. Environment names
//! are case-insensitive and always stored lower-cased.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::utils::{deserialize_id, deserialize_optional_id, is_false};

/// Names that default to requiring confirmation in the init wizard
const PRODUCTION_LIKE_NAMES: &[&str] = &["production", "prod", "live", "main", "master"];

/// Names preferred as the default environment, safest first
const SAFE_DEFAULT_NAMES: &[&str] = &["staging", "development", "dev", "local", "test"];

/// A single named deployment target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub server: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_id"
    )]
    pub site: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub confirm: bool,
}

impl EnvironmentEntry {
    pub fn new(server: u64, site: Option<u64>) -> Self {
        Self {
            server,
            site,
            confirm: false,
        }
    }

    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }
}

/// On-disk shape of the `.forge` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_id"
    )]
    pub server: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_id"
    )]
    pub site: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub confirm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environments: Option<IndexMap<String, EnvironmentEntry>>,
}

/// Result of resolving a deployment target
///
/// `name` is `None` for a legacy simple config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub name: Option<String>,
    pub config: EnvironmentEntry,
}

impl ResolvedEnvironment {
    pub fn server_id(&self) -> u64 {
        self.config.server
    }

    pub fn site_id(&self) -> Option<u64> {
        self.config.site
    }
}

/// Partial update applied by `config set`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentUpdate {
    pub server: Option<u64>,
    pub site: Option<u64>,
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
    pub entry: EnvironmentEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// Set when the removed environment was the default and another took over
    pub new_default: Option<String>,
    /// No environments remain; the caller should delete the file
    pub now_empty: bool,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl RawConfig {
    pub fn is_empty(&self) -> bool {
        *self == RawConfig::default()
    }

    pub fn has_environments(&self) -> bool {
        self.environments.is_some()
    }

    /// Environment names in stored order
    pub fn environment_names(&self) -> Vec<String> {
        self.environments
            .as_ref()
            .map(|envs| envs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn default_environment(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentEntry> {
        self.environments.as_ref()?.get(&normalize(name))
    }

    pub fn is_environment_name(&self, name: &str) -> bool {
        self.environment(name).is_some()
    }

    /// The legacy single-target fields, if this is a simple config with a server
    pub fn simple_entry(&self) -> Option<EnvironmentEntry> {
        if self.has_environments() {
            return None;
        }
        let server = self.server?;
        Some(EnvironmentEntry::new(server, self.site).with_confirm(self.confirm))
    }

    /// Resolve the environment to use.
    ///
    /// Priority:
    /// 1. Explicitly specified environment name
    /// 2. Default environment from config
    /// 3. `None` if neither applies or the name is not configured
    ///
    /// A simple config resolves to an anonymous environment regardless of
    /// `specified`.
    pub fn resolve(&self, specified: Option<&str>) -> Option<ResolvedEnvironment> {
        let Some(environments) = &self.environments else {
            return self.simple_entry().map(|config| ResolvedEnvironment { name: None, config });
        };

        let name = normalize(specified.or(self.default.as_deref())?);
        let config = environments.get(&name)?.clone();

        Some(ResolvedEnvironment {
            name: Some(name),
            config,
        })
    }

    /// Like [`resolve`](Self::resolve), but a name that was asked for and
    /// not found is an error listing what is available.
    pub fn resolve_required(&self, specified: Option<&str>) -> Result<Option<ResolvedEnvironment>> {
        let resolved = self.resolve(specified);

        if resolved.is_none() {
            if let Some(name) = specified {
                return Err(ForgeError::UnknownEnvironment {
                    name: name.to_string(),
                    available: self.environment_names(),
                });
            }
        }

        Ok(resolved)
    }

    /// Insert or replace an environment, converting a simple config.
    ///
    /// The simple fields are dropped on conversion; callers that want to
    /// keep them should read [`simple_entry`](Self::simple_entry) first.
    pub fn upsert(&mut self, name: &str, entry: EnvironmentEntry) {
        let name = normalize(name);

        if !self.has_environments() {
            self.server = None;
            self.site = None;
            self.confirm = false;
        }

        self.environments
            .get_or_insert_with(IndexMap::new)
            .insert(name.clone(), entry);

        if self.default.is_none() {
            self.default = Some(name);
        }
    }

    /// Merge a partial update into the named environment.
    ///
    /// Fails with `MissingServer` before touching the config when neither
    /// the update nor the existing entry carries a server.
    pub fn apply_update(&mut self, name: &str, update: EnvironmentUpdate) -> Result<UpsertOutcome> {
        let key = normalize(name);
        let existing = self.environment(&key).cloned();
        let created = existing.is_none();

        let server = update
            .server
            .or(existing.as_ref().map(|e| e.server))
            .ok_or_else(|| ForgeError::MissingServer { name: key.clone() })?;

        let entry = EnvironmentEntry {
            server,
            site: update.site.or(existing.as_ref().and_then(|e| e.site)),
            confirm: update
                .confirm
                .unwrap_or(existing.as_ref().is_some_and(|e| e.confirm)),
        };

        self.upsert(&key, entry.clone());
        tracing::debug!("Upserted environment {} (created: {})", key, created);

        Ok(UpsertOutcome { created, entry })
    }

    /// Remove an environment, keeping `default` pointing at a real entry
    pub fn remove(&mut self, name: &str) -> Result<RemovalOutcome> {
        let key = normalize(name);
        let available = self.environment_names();

        let environments = self
            .environments
            .as_mut()
            .filter(|envs| envs.contains_key(&key))
            .ok_or_else(|| ForgeError::UnknownEnvironment {
                name: key.clone(),
                available,
            })?;

        environments.shift_remove(&key);

        let mut new_default = None;
        if self.default.as_deref() == Some(key.as_str()) {
            self.default = environments.keys().next().cloned();
            new_default = self.default.clone();
        }

        Ok(RemovalOutcome {
            new_default,
            now_empty: environments.is_empty(),
        })
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let key = normalize(name);

        let Some(environments) = &self.environments else {
            return Err(ForgeError::NotEnvironmentShaped);
        };

        if !environments.contains_key(&key) {
            return Err(ForgeError::UnknownEnvironment {
                name: key,
                available: self.environment_names(),
            });
        }

        self.default = Some(key);
        Ok(())
    }

    /// Lower-case every environment name and the default.
    ///
    /// When two names collide after lower-casing, the first one wins. A
    /// default that names no environment is cleared.
    pub fn normalized(mut self) -> Self {
        if let Some(environments) = self.environments.take() {
            let mut normalized = IndexMap::with_capacity(environments.len());
            for (name, entry) in environments {
                let key = normalize(&name);
                if normalized.contains_key(&key) {
                    tracing::warn!("Ignoring environment '{}': duplicates '{}'", name, key);
                    continue;
                }
                normalized.insert(key, entry);
            }
            self.environments = Some(normalized);
        }

        self.default = self.default.take().map(|d| normalize(&d));
        if let (Some(default), Some(environments)) = (&self.default, &self.environments) {
            if !environments.contains_key(default) {
                tracing::warn!("Default environment '{}' is not configured; ignoring it", default);
                self.default = None;
            }
        }

        self
    }
}

/// Suggest the safest default among freshly configured environments
pub fn suggest_default(environments: &IndexMap<String, EnvironmentEntry>) -> Option<String> {
    SAFE_DEFAULT_NAMES
        .iter()
        .find(|safe| environments.contains_key(**safe))
        .map(|safe| safe.to_string())
        .or_else(|| {
            environments
                .iter()
                .find(|(_, entry)| !entry.confirm)
                .map(|(name, _)| name.clone())
        })
        .or_else(|| environments.keys().next().cloned())
}

/// Whether an environment with this name should require confirmation by default
pub fn confirm_by_default(name: &str) -> bool {
    PRODUCTION_LIKE_NAMES.contains(&normalize(name).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging_and_production() -> RawConfig {
        serde_json::from_str(
            r#"{
                "default": "staging",
                "environments": {
                    "staging": {"server": 1, "site": 10},
                    "production": {"server": 1, "site": 20, "confirm": true}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_uses_default_when_unspecified() {
        let config = staging_and_production();
        let resolved = config.resolve(None).unwrap();
        assert_eq!(resolved.name.as_deref(), Some("staging"));
        assert_eq!(resolved.config, EnvironmentEntry::new(1, Some(10)));
        assert_eq!(config.resolve(None), config.resolve(Some("staging")));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let config = staging_and_production();
        let upper = config.resolve(Some("Production")).unwrap();
        assert_eq!(Some(upper.clone()), config.resolve(Some("production")));
        assert!(upper.config.confirm);
        assert_eq!(upper.site_id(), Some(20));
    }

    #[test]
    fn test_resolve_simple_config_is_anonymous() {
        let config: RawConfig =
            serde_json::from_str(r#"{"server": 5, "site": 9, "confirm": true}"#).unwrap();
        let resolved = config.resolve(None).unwrap();
        assert_eq!(resolved.name, None);
        assert_eq!(resolved.server_id(), 5);
        assert_eq!(resolved.site_id(), Some(9));
        assert!(resolved.config.confirm);
        assert!(config.environment_names().is_empty());
    }

    #[test]
    fn test_resolve_empty_config_is_none() {
        let config = RawConfig::default();
        assert_eq!(config.resolve(None), None);
        assert_eq!(config.resolve(Some("staging")), None);
        assert!(config.resolve_required(None).unwrap().is_none());
    }

    #[test]
    fn test_resolve_without_default_is_none() {
        let mut config = staging_and_production();
        config.default = None;
        assert_eq!(config.resolve(None), None);
    }

    #[test]
    fn test_resolve_required_reports_available_names() {
        let config = staging_and_production();
        match config.resolve_required(Some("qa")) {
            Err(ForgeError::UnknownEnvironment { name, available }) => {
                assert_eq!(name, "qa");
                assert_eq!(available, vec!["staging", "production"]);
            }
            other => panic!("expected UnknownEnvironment, got {:?}", other),
        }
    }

    #[test]
    fn test_names_keep_insertion_order() {
        let mut config = RawConfig::default();
        config.upsert("zeta", EnvironmentEntry::new(1, None));
        config.upsert("alpha", EnvironmentEntry::new(2, None));
        assert_eq!(config.environment_names(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_first_upsert_becomes_default() {
        let mut config = RawConfig::default();
        config.upsert("Staging", EnvironmentEntry::new(1, Some(10)));
        config.upsert("production", EnvironmentEntry::new(1, Some(20)));
        assert_eq!(config.default_environment(), Some("staging"));
        assert!(config.is_environment_name("STAGING"));
    }

    #[test]
    fn test_upsert_converts_simple_config() {
        let mut config: RawConfig = serde_json::from_str(r#"{"server": 5, "site": 9}"#).unwrap();
        let legacy = config.simple_entry().unwrap();

        config.upsert("production", EnvironmentEntry::new(6, None));
        config.upsert("legacy", legacy);

        assert_eq!(config.server, None);
        assert_eq!(config.site, None);
        assert_eq!(config.default_environment(), Some("production"));
        assert_eq!(config.environment("legacy"), Some(&EnvironmentEntry::new(5, Some(9))));
        assert_eq!(config.simple_entry(), None);
    }

    #[test]
    fn test_apply_update_merges_existing_entry() {
        let mut config = staging_and_production();
        let outcome = config
            .apply_update(
                "production",
                EnvironmentUpdate {
                    site: Some(21),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.entry, EnvironmentEntry::new(1, Some(21)).with_confirm(true));

        let outcome = config
            .apply_update(
                "production",
                EnvironmentUpdate {
                    confirm: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!outcome.entry.confirm);
    }

    #[test]
    fn test_apply_update_without_server_is_rejected() {
        let mut config = staging_and_production();
        let before = config.clone();
        let result = config.apply_update(
            "qa",
            EnvironmentUpdate {
                site: Some(30),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ForgeError::MissingServer { name }) if name == "qa"));
        assert_eq!(config, before);
    }

    #[test]
    fn test_removing_default_reassigns_it() {
        let mut config = staging_and_production();
        let outcome = config.remove("Staging").unwrap();
        assert_eq!(outcome.new_default.as_deref(), Some("production"));
        assert!(!outcome.now_empty);
        assert_eq!(config.default_environment(), Some("production"));
    }

    #[test]
    fn test_removing_last_environment_clears_default() {
        let mut config = staging_and_production();
        config.remove("production").unwrap();
        let outcome = config.remove("staging").unwrap();
        assert!(outcome.now_empty);
        assert_eq!(outcome.new_default, None);
        assert_eq!(config.default_environment(), None);
    }

    #[test]
    fn test_removing_non_default_keeps_default() {
        let mut config = staging_and_production();
        let outcome = config.remove("production").unwrap();
        assert_eq!(outcome.new_default, None);
        assert_eq!(config.default_environment(), Some("staging"));
    }

    #[test]
    fn test_remove_unknown_environment() {
        let mut config = staging_and_production();
        assert!(matches!(
            config.remove("qa"),
            Err(ForgeError::UnknownEnvironment { .. })
        ));
    }

    #[test]
    fn test_set_default() {
        let mut config = staging_and_production();
        config.set_default("PRODUCTION").unwrap();
        assert_eq!(config.default_environment(), Some("production"));
        assert!(config.set_default("qa").is_err());

        let mut simple: RawConfig = serde_json::from_str(r#"{"server": 5}"#).unwrap();
        assert!(matches!(
            simple.set_default("production"),
            Err(ForgeError::NotEnvironmentShaped)
        ));
    }

    #[test]
    fn test_normalized_lowercases_names_and_default() {
        let config: RawConfig = serde_json::from_str(
            r#"{
                "default": "Staging",
                "environments": {
                    "Staging": {"server": 1},
                    "STAGING": {"server": 2},
                    "Production": {"server": 3}
                }
            }"#,
        )
        .unwrap();
        let config = config.normalized();
        assert_eq!(config.environment_names(), vec!["staging", "production"]);
        assert_eq!(config.environment("staging").unwrap().server, 1);
        assert_eq!(config.default_environment(), Some("staging"));
    }

    #[test]
    fn test_normalized_drops_dangling_default() {
        let config: RawConfig = serde_json::from_str(
            r#"{"default": "gone", "environments": {"staging": {"server": 1}}}"#,
        )
        .unwrap();
        assert_eq!(config.normalized().default_environment(), None);
    }

    #[test]
    fn test_suggest_default_prefers_safe_names() {
        let mut envs = IndexMap::new();
        envs.insert("production".to_string(), EnvironmentEntry::new(1, None).with_confirm(true));
        envs.insert("staging".to_string(), EnvironmentEntry::new(1, None));
        assert_eq!(suggest_default(&envs).as_deref(), Some("staging"));

        let mut envs = IndexMap::new();
        envs.insert("live".to_string(), EnvironmentEntry::new(1, None).with_confirm(true));
        envs.insert("preview".to_string(), EnvironmentEntry::new(1, None));
        assert_eq!(suggest_default(&envs).as_deref(), Some("preview"));

        let mut envs = IndexMap::new();
        envs.insert("live".to_string(), EnvironmentEntry::new(1, None).with_confirm(true));
        assert_eq!(suggest_default(&envs).as_deref(), Some("live"));
    }

    #[test]
    fn test_confirm_by_default_for_production_names() {
        assert!(confirm_by_default("production"));
        assert!(confirm_by_default("Prod"));
        assert!(!confirm_by_default("staging"));
    }
}
