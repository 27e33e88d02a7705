//! Storage backends the coordinator writes through.
//!
//! A backend is one independently failing store. Which concrete store sits
//! behind each coordinator slot is decided once, at construction:
//! - `SqliteBackend`: embedded relational store (snake_case columns)
//! - `DocumentBackend`: JSON document store (camelCase documents)
//! - `RemoteBackend`: the same operations over the server's HTTP store routes
//! - `MemoryBackend`: in-process store with scripted faults, for tests and demos

pub mod document;
pub mod memory;
pub mod remote;
pub mod sqlite;

pub use document::DocumentBackend;
pub use memory::{BackendCall, CallKind, MemoryBackend};
pub use remote::RemoteBackend;
pub use sqlite::SqliteBackend;

use anyhow::{Context, Result};
use async_trait::async_trait;
use heck::{ToLowerCamelCase, ToSnakeCase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::entities::{EntityKind, Fields};
use crate::error::BackendError;

// ============================================================================
// TENANT
// ============================================================================

/// Owner of every record written by one coordinator (already authenticated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        TenantId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// BACKEND CAPABILITY
// ============================================================================

/// One store's create/update/delete surface, dispatched by entity kind.
///
/// `fields` and `patch` use canonical snake_case keys; each backend maps them
/// to its own naming. Identifiers are backend-scoped. Every call is scoped to
/// a tenant: a record owned by someone else is reported as not found.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short label for logs and outcomes
    fn name(&self) -> &str;

    /// Insert a new record owned by `tenant`, returning the id this store assigned
    async fn create(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<String, BackendError>;

    /// Merge `patch` into an existing record
    async fn update(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
        patch: Fields,
    ) -> Result<(), BackendError>;

    async fn delete(&self, kind: EntityKind, tenant: &TenantId, id: &str) -> Result<(), BackendError>;

    /// Read back a record in canonical naming (includes `id`, `user_id`,
    /// `created_at`, `updated_at`)
    async fn get(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<Fields>, BackendError>;
}

/// True when `fields` carries `user_id` equal to `tenant`
pub fn owned_by(fields: &Fields, tenant: &TenantId) -> bool {
    fields.get("user_id").and_then(|v| v.as_str()) == Some(tenant.as_str())
}

/// Open the backend described by `config`
pub fn connect(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match config {
        BackendConfig::Sqlite { path } => Arc::new(
            SqliteBackend::open(path)
                .with_context(|| format!("Failed to open SQLite store at {:?}", path))?,
        ),
        BackendConfig::Document { root } => Arc::new(
            DocumentBackend::open(root)
                .with_context(|| format!("Failed to open document store at {:?}", root))?,
        ),
        BackendConfig::Remote {
            base_url,
            store,
            timeout_secs,
        } => Arc::new(
            RemoteBackend::new(base_url, store, *timeout_secs)
                .with_context(|| format!("Failed to build HTTP client for {}", base_url))?,
        ),
        BackendConfig::Memory { name } => Arc::new(MemoryBackend::new(name)),
    };

    tracing::debug!(backend = backend.name(), "backend connected");
    Ok(backend)
}

// ============================================================================
// FIELD NAMING
// ============================================================================

/// `target_value` -> `targetValue`
pub fn to_camel_case(key: &str) -> String {
    key.to_lower_camel_case()
}

/// `targetValue` -> `target_value`
pub fn to_snake_case(key: &str) -> String {
    key.to_snake_case()
}

/// Rename top-level keys only; nested values are left untouched
pub fn rename_keys(fields: Fields, rename: fn(&str) -> String) -> Fields {
    fields
        .into_iter()
        .map(|(key, value)| (rename(&key), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_and_snake_case() {
        assert_eq!(to_camel_case("target_value"), "targetValue");
        assert_eq!(to_camel_case("user_id"), "userId");
        assert_eq!(to_camel_case("name"), "name");
        assert_eq!(to_snake_case("targetValue"), "target_value");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("odds"), "odds");
        assert_eq!(to_camel_case("product_id"), "productId");
        assert_eq!(to_snake_case("estimatedCost"), "estimated_cost");
    }

    #[test]
    fn test_owned_by_compares_user_id() {
        let mut fields = Fields::new();
        fields.insert("user_id".to_string(), json!("user-1"));
        assert!(owned_by(&fields, &TenantId::new("user-1")));
        assert!(!owned_by(&fields, &TenantId::new("user-2")));
        assert!(!owned_by(&Fields::new(), &TenantId::new("user-1")));
    }

    #[test]
    fn test_rename_keys_round_trip() {
        let mut fields = Fields::new();
        fields.insert("estimated_cost".to_string(), json!(10.0));
        fields.insert("target_date".to_string(), json!("2030-01-01"));

        let camel = rename_keys(fields.clone(), to_camel_case);
        assert!(camel.contains_key("estimatedCost"));
        assert_eq!(rename_keys(camel, to_snake_case), fields);
    }

    #[test]
    fn test_connect_memory_backend() {
        let backend = connect(&BackendConfig::Memory {
            name: "scratch".to_string(),
        })
        .unwrap();
        assert_eq!(backend.name(), "scratch");
    }
}
