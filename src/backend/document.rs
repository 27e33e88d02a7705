// Document Store - one JSON file per record
//
// Layout: <root>/<collection>/<id>.json
// Documents use camelCase keys (userId, targetValue, createdAt, ...), the
// naming the document side has always used. Writes go to a temp file first
// and are renamed into place so a crash never leaves half a document.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{rename_keys, to_camel_case, to_snake_case, Backend, TenantId};
use crate::entities::{EntityKind, Fields};
use crate::error::BackendError;

pub struct DocumentBackend {
    name: String,
    root: PathBuf,
}

impl DocumentBackend {
    pub fn open(root: &Path) -> Result<Self, BackendError> {
        std::fs::create_dir_all(root)?;
        Ok(DocumentBackend {
            name: "document".to_string(),
            root: root.to_path_buf(),
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, kind: EntityKind, id: &str) -> Result<PathBuf, BackendError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(BackendError::Validation(format!(
                "invalid document id '{}'",
                id
            )));
        }
        Ok(self.root.join(kind.collection()).join(format!("{}.json", id)))
    }

    async fn read_document(&self, path: &Path) -> Result<Fields, BackendError> {
        let raw = fs::read(path).await?;
        match serde_json::from_slice(&raw)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(BackendError::Validation(format!(
                "document {:?} is not a JSON object",
                path
            ))),
        }
    }

    async fn write_document(&self, path: &Path, doc: &Fields) -> Result<(), BackendError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        // One temp file per write; concurrent writers never share it
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(BackendError::Unknown(format!(
                "failed to replace document {:?}: {}",
                path, e
            )));
        }
        Ok(())
    }

    /// The stored document, if it exists and belongs to `tenant`
    async fn read_owned(&self, path: &Path, tenant: &TenantId) -> Result<Option<Fields>, BackendError> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }
        let doc = self.read_document(path).await?;
        let owner = doc.get("userId").and_then(|v| v.as_str());
        Ok((owner == Some(tenant.as_str())).then_some(doc))
    }
}

#[async_trait]
impl Backend for DocumentBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<String, BackendError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = self.document_path(kind, &id)?;
        let now = serde_json::json!(Utc::now().to_rfc3339());

        let mut doc = rename_keys(fields, to_camel_case);
        doc.insert("userId".to_string(), serde_json::json!(tenant.as_str()));
        doc.insert("createdAt".to_string(), now.clone());
        doc.insert("updatedAt".to_string(), now);

        self.write_document(&path, &doc).await?;
        Ok(id)
    }

    async fn update(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
        patch: Fields,
    ) -> Result<(), BackendError> {
        let path = self.document_path(kind, id)?;
        let mut doc = self
            .read_owned(&path, tenant)
            .await?
            .ok_or_else(|| BackendError::not_found(kind.collection(), id))?;

        for (key, value) in rename_keys(patch, to_camel_case) {
            doc.insert(key, value);
        }
        doc.insert(
            "updatedAt".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );

        self.write_document(&path, &doc).await
    }

    async fn delete(&self, kind: EntityKind, tenant: &TenantId, id: &str) -> Result<(), BackendError> {
        let path = self.document_path(kind, id)?;
        if self.read_owned(&path, tenant).await?.is_none() {
            return Err(BackendError::not_found(kind.collection(), id));
        }
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackendError::not_found(kind.collection(), id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        let path = self.document_path(kind, id)?;
        let Some(doc) = self.read_owned(&path, tenant).await? else {
            return Ok(None);
        };

        let mut fields = rename_keys(doc, to_snake_case);
        fields.insert("id".to_string(), serde_json::json!(id));
        Ok(Some(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Dream, Entity};
    use crate::error::FailureKind;

    #[tokio::test]
    async fn test_documents_are_camel_case_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentBackend::open(dir.path()).unwrap();
        let tenant = TenantId::new("user-1");

        let fields = Dream::new("Sailboat", 30000.0).to_fields().unwrap();
        let id = store.create(EntityKind::Dream, &tenant, fields).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("dreams").join(format!("{}.json", id)))
            .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["estimatedCost"], serde_json::json!(30000.0));
        assert_eq!(doc["userId"], serde_json::json!("user-1"));

        let back = store.get(EntityKind::Dream, &tenant, &id).await.unwrap().unwrap();
        assert_eq!(back["estimated_cost"], serde_json::json!(30000.0));
        assert_eq!(back["user_id"], serde_json::json!("user-1"));
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentBackend::open(dir.path()).unwrap();
        let tenant = TenantId::new("user-1");
        let id = store
            .create(EntityKind::Dream, &tenant, Dream::new("Sailboat", 30000.0).to_fields().unwrap())
            .await
            .unwrap();

        let mut patch = Fields::new();
        patch.insert("target_date".to_string(), serde_json::json!("2030-07-01"));
        store.update(EntityKind::Dream, &tenant, &id, patch).await.unwrap();

        let back = store.get(EntityKind::Dream, &tenant, &id).await.unwrap().unwrap();
        assert_eq!(back["target_date"], serde_json::json!("2030-07-01"));

        store.delete(EntityKind::Dream, &tenant, &id).await.unwrap();
        assert!(store.get(EntityKind::Dream, &tenant, &id).await.unwrap().is_none());

        let err = store.delete(EntityKind::Dream, &tenant, &id).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_path_like_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentBackend::open(dir.path()).unwrap();

        let err = store.delete(EntityKind::Bet, &TenantId::new("user-1"), "../escape").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation);
    }

    #[tokio::test]
    async fn test_concurrent_updates_to_one_document_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(DocumentBackend::open(dir.path()).unwrap());
        let tenant = TenantId::new("user-1");
        let id = store
            .create(EntityKind::Dream, &tenant, Dream::new("Sailboat", 30000.0).to_fields().unwrap())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for n in 0..32 {
            let store = store.clone();
            let tenant = tenant.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let mut patch = Fields::new();
                patch.insert("notes".to_string(), serde_json::json!(format!("edit {}", n)));
                store.update(EntityKind::Dream, &tenant, &id, patch).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let back = store.get(EntityKind::Dream, &tenant, &id).await.unwrap().unwrap();
        assert!(back["notes"].as_str().unwrap().starts_with("edit "));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("dreams"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_documents_of_another_tenant_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentBackend::open(dir.path()).unwrap();
        let owner = TenantId::new("owner");
        let other = TenantId::new("other");
        let id = store
            .create(EntityKind::Dream, &owner, Dream::new("Sailboat", 30000.0).to_fields().unwrap())
            .await
            .unwrap();

        assert!(store.get(EntityKind::Dream, &other, &id).await.unwrap().is_none());
        let err = store.delete(EntityKind::Dream, &other, &id).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
        assert!(store.get(EntityKind::Dream, &owner, &id).await.unwrap().is_some());
    }
}
