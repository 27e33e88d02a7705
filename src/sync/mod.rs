//! Dual-write synchronization.
//!
//! Every create/update/delete of a record is mirrored into two independently
//! failing stores (slot A and slot B). The coordinator reports one aggregated
//! result per call and, for creates, can compensate a one-sided write.

pub mod coordinator;
pub mod outcome;

pub use coordinator::DualWriteCoordinator;
pub use outcome::{aggregate, partial_success, BackendOutcome, CompensationReport, SyncOutcome};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::Entity;

// ============================================================================
// SLOTS & POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::A => "a",
            Slot::B => "b",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" => Ok(Slot::A),
            "b" => Ok(Slot::B),
            other => Err(format!("unknown slot '{}', expected 'a' or 'b'", other)),
        }
    }
}

/// How hard the coordinator tries to keep the two stores in step.
///
/// The default is best effort: attempt both, succeed if either succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// A primary failure on create stops the call; the secondary is never attempted
    pub fail_fast_on_primary_error: bool,

    /// A secondary failure on create makes the whole call a failure
    pub fail_fast_on_secondary_error: bool,

    /// On create, undo a one-sided write with a compensating delete
    pub rollback_on_partial_failure: bool,

    /// Slot attempted first
    pub primary: Slot,

    /// Issue both attempts at once when no fail-fast switch depends on order
    pub concurrent: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            fail_fast_on_primary_error: false,
            fail_fast_on_secondary_error: false,
            rollback_on_partial_failure: false,
            primary: Slot::A,
            concurrent: false,
        }
    }
}

impl SyncPolicy {
    pub fn with_rollback(mut self) -> Self {
        self.rollback_on_partial_failure = true;
        self
    }

    pub fn with_fail_fast_primary(mut self) -> Self {
        self.fail_fast_on_primary_error = true;
        self
    }

    pub fn with_fail_fast_secondary(mut self) -> Self {
        self.fail_fast_on_secondary_error = true;
        self
    }

    pub fn with_primary(mut self, primary: Slot) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_concurrency(mut self) -> Self {
        self.concurrent = true;
        self
    }

    pub fn secondary(&self) -> Slot {
        self.primary.other()
    }

    /// True when a create must observe the primary before touching the secondary
    pub fn create_is_ordered(&self) -> bool {
        !self.concurrent || self.fail_fast_on_primary_error || self.fail_fast_on_secondary_error
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = crate::error::SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            _ => Err(crate::error::SyncError::UnsupportedOperation(s.to_string())),
        }
    }
}

/// Backend-scoped identifiers for one logical record.
///
/// Ids are never translated between stores. A slot with no id is skipped
/// by update/delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<String>,
}

impl RecordRef {
    /// Same id in both stores
    pub fn shared(id: &str) -> Self {
        RecordRef {
            a: Some(id.to_string()),
            b: Some(id.to_string()),
        }
    }

    pub fn per_backend(a: Option<&str>, b: Option<&str>) -> Self {
        RecordRef {
            a: a.map(str::to_string),
            b: b.map(str::to_string),
        }
    }

    pub fn only(slot: Slot, id: &str) -> Self {
        match slot {
            Slot::A => RecordRef::per_backend(Some(id), None),
            Slot::B => RecordRef::per_backend(None, Some(id)),
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => self.a.as_deref(),
            Slot::B => self.b.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_none() && self.b.is_none()
    }
}

/// One unit of work for the coordinator
#[derive(Debug, Clone)]
pub enum SyncOperation<E: Entity> {
    Create(E),
    Update { target: RecordRef, patch: E::Patch },
    Delete { target: RecordRef },
}

impl<E: Entity> SyncOperation<E> {
    pub fn kind(&self) -> OperationKind {
        match self {
            SyncOperation::Create(_) => OperationKind::Create,
            SyncOperation::Update { .. } => OperationKind::Update,
            SyncOperation::Delete { .. } => OperationKind::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Goal, GoalPatch};

    #[test]
    fn test_slot_parse_and_other() {
        assert_eq!("A".parse::<Slot>().unwrap(), Slot::A);
        assert_eq!(Slot::A.other(), Slot::B);
        assert!("c".parse::<Slot>().is_err());
    }

    #[test]
    fn test_record_ref_lookup() {
        let target = RecordRef::only(Slot::B, "doc-9");
        assert_eq!(target.get(Slot::A), None);
        assert_eq!(target.get(Slot::B), Some("doc-9"));
        assert!(!target.is_empty());
        assert!(RecordRef::default().is_empty());
    }

    #[test]
    fn test_ordering_required_by_fail_fast() {
        assert!(SyncPolicy::default().create_is_ordered());
        assert!(!SyncPolicy::default().with_concurrency().create_is_ordered());
        assert!(SyncPolicy::default()
            .with_concurrency()
            .with_fail_fast_primary()
            .create_is_ordered());
    }

    #[test]
    fn test_operation_kind() {
        let op: SyncOperation<Goal> = SyncOperation::Update {
            target: RecordRef::shared("g1"),
            patch: GoalPatch::default(),
        };
        assert_eq!(op.kind(), OperationKind::Update);
        assert_eq!("DELETE".parse::<OperationKind>().unwrap(), OperationKind::Delete);
    }

    #[test]
    fn test_policy_deserializes_partially() {
        let policy: SyncPolicy =
            serde_json::from_str(r#"{ "primary": "b", "rollback_on_partial_failure": true }"#).unwrap();
        assert_eq!(policy.primary, Slot::B);
        assert!(policy.rollback_on_partial_failure);
        assert!(!policy.concurrent);
    }
}
