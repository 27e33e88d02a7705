// Configuration - JSON file first, FINANCE_SYNC_* environment variables on top
//
// Example file:
// {
//   "tenant": "local-user",
//   "backend_a": { "type": "sqlite", "path": "finance.db" },
//   "backend_b": { "type": "document", "root": "documents" },
//   "policy": { "rollback_on_partial_failure": true }
// }

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sync::{Slot, SyncPolicy};

/// Which concrete store sits behind a coordinator slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Sqlite {
        path: PathBuf,
    },
    Document {
        root: PathBuf,
    },
    Remote {
        base_url: String,
        store: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
    Memory {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tenant used by the CLI when --tenant is not given
    pub tenant: String,
    pub backend_a: BackendConfig,
    pub backend_b: BackendConfig,
    pub policy: SyncPolicy,
    pub listen_addr: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tenant: "local".to_string(),
            backend_a: BackendConfig::Sqlite {
                path: PathBuf::from("finance.db"),
            },
            backend_b: BackendConfig::Document {
                root: PathBuf::from("documents"),
            },
            policy: SyncPolicy::default(),
            listen_addr: "0.0.0.0:3000".to_string(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load from `path` (if given) then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Environment overrides; `lookup` is injectable for tests
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tenant) = lookup("FINANCE_SYNC_TENANT") {
            self.tenant = tenant;
        }
        if let Some(path) = lookup("FINANCE_SYNC_SQLITE_PATH") {
            self.backend_a = BackendConfig::Sqlite { path: PathBuf::from(path) };
        }
        if let Some(root) = lookup("FINANCE_SYNC_DOCUMENT_ROOT") {
            self.backend_b = BackendConfig::Document { root: PathBuf::from(root) };
        }
        if let Some(base_url) = lookup("FINANCE_SYNC_REMOTE_URL") {
            // Remote mode: both slots go through the API server's store routes
            self.backend_a = BackendConfig::Remote {
                base_url: base_url.clone(),
                store: "sqlite".to_string(),
                timeout_secs: None,
            };
            self.backend_b = BackendConfig::Remote {
                base_url,
                store: "document".to_string(),
                timeout_secs: None,
            };
        }
        if let Some(primary) = lookup("FINANCE_SYNC_PRIMARY") {
            self.policy.primary = primary
                .parse::<Slot>()
                .map_err(|e| anyhow!("FINANCE_SYNC_PRIMARY: {}", e))?;
        }
        if let Some(value) = lookup("FINANCE_SYNC_FAIL_FAST_PRIMARY") {
            self.policy.fail_fast_on_primary_error = parse_bool("FINANCE_SYNC_FAIL_FAST_PRIMARY", &value)?;
        }
        if let Some(value) = lookup("FINANCE_SYNC_FAIL_FAST_SECONDARY") {
            self.policy.fail_fast_on_secondary_error =
                parse_bool("FINANCE_SYNC_FAIL_FAST_SECONDARY", &value)?;
        }
        if let Some(value) = lookup("FINANCE_SYNC_ROLLBACK") {
            self.policy.rollback_on_partial_failure = parse_bool("FINANCE_SYNC_ROLLBACK", &value)?;
        }
        if let Some(value) = lookup("FINANCE_SYNC_CONCURRENT") {
            self.policy.concurrent = parse_bool("FINANCE_SYNC_CONCURRENT", &value)?;
        }
        if let Some(addr) = lookup("FINANCE_SYNC_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(value) = lookup("FINANCE_SYNC_LOG_JSON") {
            self.log_json = parse_bool("FINANCE_SYNC_LOG_JSON", &value)?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{}: expected a boolean, got '{}'", key, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_best_effort() {
        let config = AppConfig::default();
        assert!(!config.policy.rollback_on_partial_failure);
        assert!(!config.policy.fail_fast_on_primary_error);
        assert_eq!(config.policy.primary, Slot::A);
    }

    #[test]
    fn test_env_overrides_policy() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("FINANCE_SYNC_ROLLBACK", "true"),
                ("FINANCE_SYNC_PRIMARY", "b"),
                ("FINANCE_SYNC_TENANT", "user-42"),
            ]))
            .unwrap();

        assert!(config.policy.rollback_on_partial_failure);
        assert_eq!(config.policy.primary, Slot::B);
        assert_eq!(config.tenant, "user-42");
    }

    #[test]
    fn test_remote_url_switches_both_slots() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("FINANCE_SYNC_REMOTE_URL", "http://api.local")]))
            .unwrap();

        assert!(matches!(config.backend_a, BackendConfig::Remote { ref store, .. } if store == "sqlite"));
        assert!(matches!(config.backend_b, BackendConfig::Remote { ref store, .. } if store == "document"));
    }

    #[test]
    fn test_bad_boolean_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("FINANCE_SYNC_CONCURRENT", "sometimes")]))
            .unwrap_err();
        assert!(err.to_string().contains("FINANCE_SYNC_CONCURRENT"));
    }

    #[test]
    fn test_parse_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "tenant": "file-user",
                "backend_b": { "type": "memory", "name": "scratch" },
                "policy": { "rollback_on_partial_failure": true }
            }"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.tenant, "file-user");
        assert_eq!(
            config.backend_b,
            BackendConfig::Memory { name: "scratch".to_string() }
        );
        assert!(config.policy.rollback_on_partial_failure);
        assert!(matches!(config.backend_a, BackendConfig::Sqlite { .. }));
    }
}
