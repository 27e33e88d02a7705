// In-Memory Store - records in a map, faults on demand
//
// Every call is logged before anything else happens, so tests can assert
// exactly which operations reached this store (including failed ones).

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::{owned_by, Backend, TenantId};
use crate::entities::{EntityKind, Fields};
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Create,
    Update,
    Delete,
    Get,
}

/// One operation that reached the store
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub call: CallKind,
    pub kind: EntityKind,

    /// Target id for update/delete/get; None for create
    pub id: Option<String>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    records: HashMap<(EntityKind, String), Fields>,
    one_shot_faults: HashMap<CallKind, VecDeque<BackendError>>,
    standing_faults: HashMap<CallKind, BackendError>,
    calls: Vec<BackendCall>,
}

pub struct MemoryBackend {
    name: String,
    id_prefix: String,
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        MemoryBackend {
            name: name.to_string(),
            id_prefix: format!("{}-", name),
            state: Mutex::new(State::default()),
        }
    }

    /// Ids become `<prefix>1`, `<prefix>2`, ...
    pub fn with_id_prefix(mut self, prefix: &str) -> Self {
        self.id_prefix = prefix.to_string();
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `call` with `err`, then behave normally
    pub fn fail_next(&self, call: CallKind, err: BackendError) {
        self.state()
            .one_shot_faults
            .entry(call)
            .or_default()
            .push_back(err);
    }

    /// Fail every `call` with `err` until cleared
    pub fn fail_always(&self, call: CallKind, err: BackendError) {
        self.state().standing_faults.insert(call, err);
    }

    /// Simulate the whole store being unreachable
    pub fn go_down(&self, message: &str) {
        for call in [CallKind::Create, CallKind::Update, CallKind::Delete, CallKind::Get] {
            self.fail_always(call, BackendError::Connectivity(message.to_string()));
        }
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.one_shot_faults.clear();
        state.standing_faults.clear();
    }

    /// Put a record in place without logging a call
    pub fn seed(&self, kind: EntityKind, id: &str, fields: Fields) {
        self.state().records.insert((kind, id.to_string()), fields);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    pub fn calls_of(&self, call: CallKind) -> Vec<BackendCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.call == call)
            .cloned()
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.state().records.contains_key(&(kind, id.to_string()))
    }

    /// Log the call, then return the fault scheduled for it (if any)
    fn enter(&self, call: CallKind, kind: EntityKind, id: Option<&str>) -> Result<MutexGuard<'_, State>, BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall {
            call,
            kind,
            id: id.map(str::to_string),
        });

        if let Some(err) = state
            .one_shot_faults
            .get_mut(&call)
            .and_then(|queue| queue.pop_front())
        {
            return Err(err);
        }
        if let Some(err) = state.standing_faults.get(&call) {
            return Err(err.clone());
        }
        Ok(state)
    }
}

/// Seeded records without an owner are visible to every tenant
fn visible_to(record: &Fields, tenant: &TenantId) -> bool {
    !record.contains_key("user_id") || owned_by(record, tenant)
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        mut fields: Fields,
    ) -> Result<String, BackendError> {
        let mut state = self.enter(CallKind::Create, kind, None)?;

        state.next_id += 1;
        let id = format!("{}{}", self.id_prefix, state.next_id);
        let now = serde_json::json!(Utc::now().to_rfc3339());
        fields.insert("user_id".to_string(), serde_json::json!(tenant.as_str()));
        fields.insert("created_at".to_string(), now.clone());
        fields.insert("updated_at".to_string(), now);
        state.records.insert((kind, id.clone()), fields);

        Ok(id)
    }

    async fn update(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
        patch: Fields,
    ) -> Result<(), BackendError> {
        let mut state = self.enter(CallKind::Update, kind, Some(id))?;

        let record = state
            .records
            .get_mut(&(kind, id.to_string()))
            .filter(|record| visible_to(record, tenant))
            .ok_or_else(|| BackendError::not_found(kind.collection(), id))?;
        for (key, value) in patch {
            record.insert(key, value);
        }
        record.insert(
            "updated_at".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, tenant: &TenantId, id: &str) -> Result<(), BackendError> {
        let mut state = self.enter(CallKind::Delete, kind, Some(id))?;

        let key = (kind, id.to_string());
        if !state.records.get(&key).is_some_and(|record| visible_to(record, tenant)) {
            return Err(BackendError::not_found(kind.collection(), id));
        }
        state.records.remove(&key);
        Ok(())
    }

    async fn get(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        let state = self.enter(CallKind::Get, kind, Some(id))?;

        let record = state
            .records
            .get(&(kind, id.to_string()))
            .filter(|record| visible_to(record, tenant));
        Ok(record.map(|fields| {
            let mut fields = fields.clone();
            fields.insert("id".to_string(), serde_json::json!(id));
            fields
        }))
    }
}
