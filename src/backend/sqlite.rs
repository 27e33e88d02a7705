// SQLite Store - embedded relational backend
//
// One table per entity kind. Record fields live in a JSON `data` column so the
// seven kinds share one code path; ownership and timestamps are real columns.
// Every write also appends to `sync_events` (audit trail: every change is an event).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Backend, TenantId};
use crate::entities::{EntityKind, Fields};
use crate::error::BackendError;

/// Audit event written alongside each successful write
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        kind: EntityKind,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: kind.as_str().to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub struct SqliteBackend {
    name: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        let conn = Connection::open(path)?;
        Self::from_connection("sqlite", conn)
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection("sqlite", conn)
    }

    pub fn from_connection(name: &str, conn: Connection) -> Result<Self, BackendError> {
        setup_database(&conn)?;
        Ok(SqliteBackend {
            name: name.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce(&mut Connection) -> Result<T, BackendError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| BackendError::Unknown("SQLite connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }

    /// Audit trail for one record, oldest first
    pub async fn events_for(&self, kind: EntityKind, id: &str) -> Result<Vec<Event>, BackendError> {
        let id = id.to_string();
        self.with_conn(move |conn| get_events_for_entity(conn, kind, &id))
            .await
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), BackendError> {
    // WAL for crash recovery; in-memory databases silently stay in "memory" mode
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // One table per entity kind
    // ==========================================================================
    for kind in EntityKind::ALL {
        let table = kind.collection();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    data TEXT NOT NULL,
                    version INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"
            ),
            [],
        )?;
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table}(user_id)"),
            [],
        )?;
    }

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_events_entity ON sync_events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), BackendError> {
    conn.execute(
        "INSERT INTO sync_events (event_id, timestamp, event_type, entity_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            serde_json::to_string(&event.data)?,
            event.actor,
        ],
    )?;
    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    kind: EntityKind,
    entity_id: &str,
) -> Result<Vec<Event>, BackendError> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM sync_events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![kind.as_str(), entity_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (event_id, timestamp, event_type, entity_type, entity_id, data, actor) = row?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| BackendError::Validation(format!("bad event timestamp: {}", e)))?
            .with_timezone(&Utc);
        events.push(Event {
            event_id,
            timestamp,
            event_type,
            entity_type,
            entity_id,
            data: serde_json::from_str(&data)?,
            actor,
        });
    }

    Ok(events)
}

fn parse_data(kind: EntityKind, id: &str, raw: &str) -> Result<Fields, BackendError> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(BackendError::Validation(format!(
            "{} record '{}' has non-object data",
            kind, id
        ))),
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<String, BackendError> {
        let tenant = tenant.as_str().to_string();
        self.with_conn(move |conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            let data = serde_json::Value::Object(fields);

            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (id, user_id, data, version, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                    kind.collection()
                ),
                params![id, tenant, serde_json::to_string(&data)?, now],
            )?;
            insert_event(&tx, &Event::new("created", kind, &id, data, &tenant))?;
            tx.commit()?;

            Ok(id)
        })
        .await
    }

    async fn update(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
        patch: Fields,
    ) -> Result<(), BackendError> {
        let id = id.to_string();
        let owner = tenant.as_str().to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    &format!(
                        "SELECT data FROM {} WHERE id = ?1 AND user_id = ?2",
                        kind.collection()
                    ),
                    params![id, owner],
                    |row| row.get(0),
                )
                .optional()?;

            let raw = existing.ok_or_else(|| BackendError::not_found(kind.collection(), &id))?;

            let mut data = parse_data(kind, &id, &raw)?;
            for (key, value) in patch.iter() {
                data.insert(key.clone(), value.clone());
            }

            tx.execute(
                &format!(
                    "UPDATE {} SET data = ?1, version = version + 1, updated_at = ?2 WHERE id = ?3",
                    kind.collection()
                ),
                params![
                    serde_json::to_string(&serde_json::Value::Object(data))?,
                    Utc::now().to_rfc3339(),
                    id
                ],
            )?;
            insert_event(
                &tx,
                &Event::new("updated", kind, &id, serde_json::Value::Object(patch), &owner),
            )?;
            tx.commit()?;

            Ok(())
        })
        .await
    }

    async fn delete(&self, kind: EntityKind, tenant: &TenantId, id: &str) -> Result<(), BackendError> {
        let id = id.to_string();
        let owner = tenant.as_str().to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1 AND user_id = ?2", kind.collection()),
                params![id, owner],
            )?;
            if removed == 0 {
                return Err(BackendError::not_found(kind.collection(), &id));
            }
            insert_event(
                &tx,
                &Event::new("deleted", kind, &id, serde_json::Value::Null, &owner),
            )?;
            tx.commit()?;

            Ok(())
        })
        .await
    }

    async fn get(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        let id = id.to_string();
        let owner = tenant.as_str().to_string();
        self.with_conn(move |conn| {
            let row: Option<(String, String, String, String)> = conn
                .query_row(
                    &format!(
                        "SELECT user_id, data, created_at, updated_at FROM {} WHERE id = ?1 AND user_id = ?2",
                        kind.collection()
                    ),
                    params![id, owner],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let Some((user_id, raw, created_at, updated_at)) = row else {
                return Ok(None);
            };

            let mut fields = parse_data(kind, &id, &raw)?;
            fields.insert("id".to_string(), serde_json::json!(id));
            fields.insert("user_id".to_string(), serde_json::json!(user_id));
            fields.insert("created_at".to_string(), serde_json::json!(created_at));
            fields.insert("updated_at".to_string(), serde_json::json!(updated_at));
            Ok(Some(fields))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Entity, Goal, GoalPatch};
    use crate::error::FailureKind;
    use chrono::NaiveDate;

    fn goal_fields() -> Fields {
        Goal::new(
            "Emergency fund",
            5000.0,
            "USD",
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        )
        .to_fields()
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = SqliteBackend::open_in_memory().unwrap();
        let tenant = TenantId::new("user-1");

        let id = store.create(EntityKind::Goal, &tenant, goal_fields()).await.unwrap();
        let fields = store.get(EntityKind::Goal, &tenant, &id).await.unwrap().unwrap();

        assert_eq!(fields["name"], serde_json::json!("Emergency fund"));
        assert_eq!(fields["user_id"], serde_json::json!("user-1"));
        assert_eq!(fields["id"], serde_json::json!(id));
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let store = SqliteBackend::open_in_memory().unwrap();
        let tenant = TenantId::new("user-1");
        let id = store.create(EntityKind::Goal, &tenant, goal_fields()).await.unwrap();

        let patch = Goal::patch_fields(&GoalPatch {
            current_value: Some(1200.0),
            ..Default::default()
        })
        .unwrap();
        store.update(EntityKind::Goal, &tenant, &id, patch).await.unwrap();

        let fields = store.get(EntityKind::Goal, &tenant, &id).await.unwrap().unwrap();
        assert_eq!(fields["current_value"], serde_json::json!(1200.0));
        assert_eq!(fields["unit"], serde_json::json!("USD"));
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_id_are_not_found() {
        let store = SqliteBackend::open_in_memory().unwrap();
        let tenant = TenantId::new("user-1");

        let mut patch = Fields::new();
        patch.insert("name".to_string(), serde_json::json!("x"));
        let err = store.update(EntityKind::Expense, &tenant, "missing", patch).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);

        let err = store.delete(EntityKind::Expense, &tenant, "missing").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_every_write_is_an_event() {
        let store = SqliteBackend::open_in_memory().unwrap();
        let tenant = TenantId::new("user-7");
        let id = store.create(EntityKind::Goal, &tenant, goal_fields()).await.unwrap();

        let mut patch = Fields::new();
        patch.insert("name".to_string(), serde_json::json!("Rainy day fund"));
        store.update(EntityKind::Goal, &tenant, &id, patch).await.unwrap();
        store.delete(EntityKind::Goal, &tenant, &id).await.unwrap();

        let events = store.events_for(EntityKind::Goal, &id).await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["created", "updated", "deleted"]);
        assert!(events.iter().all(|e| e.actor == "user-7"));
        assert!(store.get(EntityKind::Goal, &tenant, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_of_another_tenant_are_invisible() {
        let store = SqliteBackend::open_in_memory().unwrap();
        let owner = TenantId::new("owner");
        let other = TenantId::new("other");
        let id = store.create(EntityKind::Goal, &owner, goal_fields()).await.unwrap();

        assert!(store.get(EntityKind::Goal, &other, &id).await.unwrap().is_none());

        let mut patch = Fields::new();
        patch.insert("name".to_string(), serde_json::json!("hijacked"));
        let err = store.update(EntityKind::Goal, &other, &id, patch).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);

        let err = store.delete(EntityKind::Goal, &other, &id).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);

        let fields = store.get(EntityKind::Goal, &owner, &id).await.unwrap().unwrap();
        assert_eq!(fields["name"], serde_json::json!("Emergency fund"));
    }
}
