// Sync Outcome - what happened on each store, and the one answer we report
//
// Aggregation is a pure function of the two slots:
//   overall_success = a.succeeded || b.succeeded
// Policy can only force it to false afterwards (rollback, required secondary).

use serde::{Deserialize, Serialize};

use super::{OperationKind, Slot};
use crate::entities::EntityKind;
use crate::error::{BackendError, FailureKind};

// ============================================================================
// PER-BACKEND OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendOutcome {
    /// Skipped: fail-fast short circuit or no identifier for this store
    NotAttempted,

    Succeeded {
        /// Id assigned on create, or the id targeted by update/delete
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_id: Option<String>,
    },

    Failed {
        kind: FailureKind,
        error: String,
    },
}

impl BackendOutcome {
    pub fn from_result(result: Result<Option<String>, BackendError>) -> Self {
        match result {
            Ok(record_id) => BackendOutcome::Succeeded { record_id },
            Err(err) => BackendOutcome::Failed {
                kind: err.kind(),
                error: err.message().to_string(),
            },
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, BackendOutcome::Succeeded { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self, BackendOutcome::Failed { .. })
    }

    pub fn attempted(&self) -> bool {
        !matches!(self, BackendOutcome::NotAttempted)
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            BackendOutcome::Succeeded { record_id } => record_id.as_deref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BackendOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            BackendOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendOutcome::NotAttempted => "not_attempted",
            BackendOutcome::Succeeded { .. } => "succeeded",
            BackendOutcome::Failed { .. } => "failed",
        }
    }
}

/// The OR rule: one durable copy is enough
pub fn aggregate(a: &BackendOutcome, b: &BackendOutcome) -> bool {
    a.succeeded() || b.succeeded()
}

/// The slot that succeeded when its partner was attempted and failed.
///
/// A skipped partner is not a partial failure: nothing disagreed.
pub fn partial_success(a: &BackendOutcome, b: &BackendOutcome) -> Option<Slot> {
    match (a.succeeded(), b.succeeded()) {
        (true, false) if b.failed() => Some(Slot::A),
        (false, true) if a.failed() => Some(Slot::B),
        _ => None,
    }
}

// ============================================================================
// COMPENSATION
// ============================================================================

/// Result of the compensating delete issued after a one-sided create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationReport {
    pub slot: Slot,
    pub backend: String,
    pub record_id: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// SYNC OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub entity: EntityKind,
    pub operation: OperationKind,
    pub a: BackendOutcome,
    pub b: BackendOutcome,
    pub overall_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation: Option<CompensationReport>,
}

impl SyncOutcome {
    /// Aggregate two slot outcomes with the OR rule
    pub fn from_slots(
        entity: EntityKind,
        operation: OperationKind,
        a: BackendOutcome,
        b: BackendOutcome,
    ) -> Self {
        let overall_success = aggregate(&a, &b);
        SyncOutcome {
            entity,
            operation,
            a,
            b,
            overall_success,
            compensation: None,
        }
    }

    pub fn slot(&self, slot: Slot) -> &BackendOutcome {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    /// Both stores agree the write happened
    pub fn is_consistent(&self) -> bool {
        self.a.succeeded() && self.b.succeeded()
    }

    /// Succeeded in exactly one store and the lone copy is still there
    pub fn is_divergent(&self) -> bool {
        self.a.succeeded() != self.b.succeeded()
            && self.compensation.as_ref().map_or(true, |c| !c.succeeded)
    }

    /// Id the given store assigned (create) or targeted (update/delete)
    pub fn record_id(&self, slot: Slot) -> Option<&str> {
        self.slot(slot).record_id()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {}: a={}, b={}, overall={}",
            self.operation,
            self.entity,
            self.a.label(),
            self.b.label(),
            if self.overall_success { "success" } else { "failure" }
        )
    }
}
