// ⚖️ Dual-Write Coordinator - one logical write, two stores, one answer
//
// Per call:
//   Start -> AttemptPrimary -> (fail-fast? Done) -> AttemptSecondary
//         -> Aggregate -> (one-sided create + rollback? Compensate) -> Done
//
// Backend failures never escape: they become outcome slots. Only caller
// mistakes (unknown kind, payload that does not fit, invalid record) are
// returned as SyncError. No retries, no locking, no cross-store id mapping.

use std::sync::Arc;

use super::outcome::partial_success;
use super::{BackendOutcome, CompensationReport, OperationKind, RecordRef, Slot, SyncOperation, SyncOutcome, SyncPolicy};
use crate::backend::{Backend, TenantId};
use crate::entities::{Bet, Dream, Entity, EntityKind, Expense, Fields, Goal, Product, Revenue, Transaction};
use crate::error::SyncError;

/// A single store write, borrowed from the call that issues it
#[derive(Clone, Copy)]
enum Step<'a> {
    Create(&'a Fields),
    Update(&'a str, &'a Fields),
    Delete(&'a str),
}

impl Step<'_> {
    fn operation(&self) -> OperationKind {
        match self {
            Step::Create(_) => OperationKind::Create,
            Step::Update(..) => OperationKind::Update,
            Step::Delete(_) => OperationKind::Delete,
        }
    }
}

pub struct DualWriteCoordinator {
    tenant: TenantId,
    a: Arc<dyn Backend>,
    b: Arc<dyn Backend>,
    policy: SyncPolicy,
}

impl DualWriteCoordinator {
    pub fn new(tenant: TenantId, a: Arc<dyn Backend>, b: Arc<dyn Backend>, policy: SyncPolicy) -> Self {
        DualWriteCoordinator { tenant, a, b, policy }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn backend(&self, slot: Slot) -> &Arc<dyn Backend> {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    // ========================================================================
    // TYPED API (one generic path for all seven entities)
    // ========================================================================

    pub async fn create<E: Entity>(&self, record: E) -> Result<SyncOutcome, SyncError> {
        record.validate().map_err(|errors| SyncError::InvalidRecord {
            kind: E::KIND.to_string(),
            errors,
        })?;
        let fields = record.to_fields()?;

        Ok(self.run_create(E::KIND, fields).await)
    }

    pub async fn update<E: Entity>(&self, target: RecordRef, patch: E::Patch) -> Result<SyncOutcome, SyncError> {
        if target.is_empty() {
            return Err(SyncError::MissingIdentifier(E::KIND.to_string()));
        }
        E::validate_patch(&patch).map_err(|errors| SyncError::InvalidRecord {
            kind: E::KIND.to_string(),
            errors,
        })?;
        let fields = E::patch_fields(&patch)?;

        Ok(self.run_independent(E::KIND, &target, Some(&fields)).await)
    }

    pub async fn delete<E: Entity>(&self, target: RecordRef) -> Result<SyncOutcome, SyncError> {
        if target.is_empty() {
            return Err(SyncError::MissingIdentifier(E::KIND.to_string()));
        }

        Ok(self.run_independent(E::KIND, &target, None).await)
    }

    pub async fn execute<E: Entity>(&self, operation: SyncOperation<E>) -> Result<SyncOutcome, SyncError> {
        match operation {
            SyncOperation::Create(record) => self.create(record).await,
            SyncOperation::Update { target, patch } => self.update::<E>(target, patch).await,
            SyncOperation::Delete { target } => self.delete::<E>(target).await,
        }
    }

    // ========================================================================
    // DYNAMIC API (kind + JSON payload, for HTTP and CLI callers)
    // ========================================================================

    /// `payload` is the full record for create and the patch for update;
    /// it is ignored for delete. `target` is required for update/delete.
    pub async fn execute_json(
        &self,
        kind: &str,
        operation: OperationKind,
        target: Option<RecordRef>,
        payload: serde_json::Value,
    ) -> Result<SyncOutcome, SyncError> {
        match kind.parse::<EntityKind>()? {
            EntityKind::Goal => self.execute_payload::<Goal>(operation, target, payload).await,
            EntityKind::Product => self.execute_payload::<Product>(operation, target, payload).await,
            EntityKind::Revenue => self.execute_payload::<Revenue>(operation, target, payload).await,
            EntityKind::Expense => self.execute_payload::<Expense>(operation, target, payload).await,
            EntityKind::Transaction => {
                self.execute_payload::<Transaction>(operation, target, payload).await
            }
            EntityKind::Dream => self.execute_payload::<Dream>(operation, target, payload).await,
            EntityKind::Bet => self.execute_payload::<Bet>(operation, target, payload).await,
        }
    }

    async fn execute_payload<E: Entity>(
        &self,
        operation: OperationKind,
        target: Option<RecordRef>,
        payload: serde_json::Value,
    ) -> Result<SyncOutcome, SyncError> {
        let malformed = |e: serde_json::Error| SyncError::MalformedPayload {
            kind: E::KIND.to_string(),
            reason: e.to_string(),
        };
        let require_target =
            || target.clone().ok_or_else(|| SyncError::MissingIdentifier(E::KIND.to_string()));

        let op = match operation {
            OperationKind::Create => SyncOperation::Create(serde_json::from_value::<E>(payload).map_err(malformed)?),
            OperationKind::Update => SyncOperation::Update {
                target: require_target()?,
                patch: serde_json::from_value::<E::Patch>(payload).map_err(malformed)?,
            },
            OperationKind::Delete => SyncOperation::Delete { target: require_target()? },
        };

        self.execute(op).await
    }

    // ========================================================================
    // ENGINE
    // ========================================================================

    #[tracing::instrument(name = "sync.create", skip_all, fields(tenant = %self.tenant, entity = %kind))]
    async fn run_create(&self, kind: EntityKind, record: Fields) -> SyncOutcome {
        let primary = self.policy.primary;
        let secondary = self.policy.secondary();
        let step = Step::Create(&record);

        let (first, second) = if self.policy.create_is_ordered() {
            let first = self.attempt(primary, kind, step).await;
            if first.failed() && self.policy.fail_fast_on_primary_error {
                tracing::warn!(
                    primary = %primary,
                    "primary failed with fail-fast set, secondary not attempted"
                );
                (first, BackendOutcome::NotAttempted)
            } else {
                let second = self.attempt(secondary, kind, step).await;
                (first, second)
            }
        } else {
            tokio::join!(
                self.attempt(primary, kind, step),
                self.attempt(secondary, kind, step)
            )
        };

        let secondary_required_failed = second.failed() && self.policy.fail_fast_on_secondary_error;
        let (a, b) = match primary {
            Slot::A => (first, second),
            Slot::B => (second, first),
        };
        let mut outcome = SyncOutcome::from_slots(kind, OperationKind::Create, a, b);

        if secondary_required_failed {
            tracing::warn!(secondary = %secondary, "secondary failed with fail-fast set, reporting failure");
            outcome.overall_success = false;
        }

        if self.policy.rollback_on_partial_failure {
            if let Some(slot) = partial_success(&outcome.a, &outcome.b) {
                let captured_id = outcome.record_id(slot).map(str::to_string);
                match captured_id {
                    Some(id) => {
                        outcome.compensation = Some(self.compensate(slot, kind, &id).await);
                    }
                    None => {
                        tracing::error!(slot = %slot, "one-sided create returned no id, cannot compensate");
                    }
                }
                outcome.overall_success = false;
            }
        }

        self.log_outcome(&outcome);
        outcome
    }

    /// Update/delete: each store with a known id is attempted, no fail-fast, no rollback
    #[tracing::instrument(name = "sync.write", skip_all, fields(tenant = %self.tenant, entity = %kind))]
    async fn run_independent(&self, kind: EntityKind, target: &RecordRef, patch: Option<&Fields>) -> SyncOutcome {
        let step_for = |slot: Slot| {
            target.get(slot).map(|id| match patch {
                Some(fields) => Step::Update(id, fields),
                None => Step::Delete(id),
            })
        };
        let operation = if patch.is_some() {
            OperationKind::Update
        } else {
            OperationKind::Delete
        };

        let primary = self.policy.primary;
        let secondary = self.policy.secondary();

        let (first, second) = if self.policy.concurrent {
            tokio::join!(
                self.attempt_if_known(primary, kind, step_for(primary)),
                self.attempt_if_known(secondary, kind, step_for(secondary))
            )
        } else {
            let first = self.attempt_if_known(primary, kind, step_for(primary)).await;
            let second = self.attempt_if_known(secondary, kind, step_for(secondary)).await;
            (first, second)
        };

        let (a, b) = match primary {
            Slot::A => (first, second),
            Slot::B => (second, first),
        };
        let outcome = SyncOutcome::from_slots(kind, operation, a, b);

        self.log_outcome(&outcome);
        outcome
    }

    async fn attempt_if_known(&self, slot: Slot, kind: EntityKind, step: Option<Step<'_>>) -> BackendOutcome {
        match step {
            Some(step) => self.attempt(slot, kind, step).await,
            None => {
                tracing::debug!(slot = %slot, "no identifier for this store, skipping");
                BackendOutcome::NotAttempted
            }
        }
    }

    async fn attempt(&self, slot: Slot, kind: EntityKind, step: Step<'_>) -> BackendOutcome {
        let backend = self.backend(slot);
        tracing::debug!(slot = %slot, backend = backend.name(), op = %step.operation(), "attempting");

        let result = match step {
            Step::Create(fields) => backend.create(kind, &self.tenant, fields.clone()).await.map(Some),
            Step::Update(id, patch) => backend
                .update(kind, &self.tenant, id, patch.clone())
                .await
                .map(|()| Some(id.to_string())),
            Step::Delete(id) => backend.delete(kind, &self.tenant, id).await.map(|()| Some(id.to_string())),
        };

        if let Err(err) = &result {
            tracing::warn!(
                slot = %slot,
                backend = backend.name(),
                op = %step.operation(),
                failure = err.kind().as_str(),
                error = %err,
                "store write failed"
            );
        }

        BackendOutcome::from_result(result)
    }

    /// Best-effort undo of a one-sided create; failures are logged, never raised
    async fn compensate(&self, slot: Slot, kind: EntityKind, id: &str) -> CompensationReport {
        let backend = self.backend(slot);
        tracing::info!(slot = %slot, backend = backend.name(), record_id = id, "compensating one-sided create");

        let result = backend.delete(kind, &self.tenant, id).await;
        if let Err(err) = &result {
            tracing::warn!(
                slot = %slot,
                backend = backend.name(),
                record_id = id,
                error = %err,
                "compensating delete failed, record left behind"
            );
        }

        CompensationReport {
            slot,
            backend: backend.name().to_string(),
            record_id: id.to_string(),
            succeeded: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }
    }

    fn log_outcome(&self, outcome: &SyncOutcome) {
        if outcome.overall_success {
            tracing::info!(
                a = outcome.a.label(),
                b = outcome.b.label(),
                divergent = outcome.is_divergent(),
                "{}",
                outcome.summary()
            );
        } else {
            tracing::warn!(
                a = outcome.a.label(),
                b = outcome.b.label(),
                compensated = outcome.compensation.is_some(),
                "{}",
                outcome.summary()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CallKind, MemoryBackend};
    use crate::entities::GoalPatch;
    use crate::error::BackendError;
    use chrono::NaiveDate;

    fn goal() -> Goal {
        Goal::new("House deposit", 20000.0, "USD", NaiveDate::from_ymd_opt(2027, 1, 1).unwrap())
    }

    fn setup(policy: SyncPolicy) -> (Arc<MemoryBackend>, Arc<MemoryBackend>, DualWriteCoordinator) {
        let a = Arc::new(MemoryBackend::new("a").with_id_prefix("g"));
        let b = Arc::new(MemoryBackend::new("b").with_id_prefix("doc-"));
        let coordinator = DualWriteCoordinator::new(
            TenantId::new("user-1"),
            a.clone(),
            b.clone(),
            policy,
        );
        (a, b, coordinator)
    }

    #[tokio::test]
    async fn test_create_writes_both_stores() {
        let (a, b, coordinator) = setup(SyncPolicy::default());

        let outcome = coordinator.create(goal()).await.unwrap();

        assert!(outcome.overall_success);
        assert!(outcome.is_consistent());
        assert_eq!(outcome.record_id(Slot::A), Some("g1"));
        assert_eq!(outcome.record_id(Slot::B), Some("doc-1"));
        assert_eq!(a.record_count(), 1);
        assert_eq!(b.record_count(), 1);
    }

    #[tokio::test]
    async fn test_primary_b_is_attempted_first_and_slots_stay_put() {
        let (a, b, coordinator) = setup(SyncPolicy::default().with_primary(Slot::B).with_fail_fast_primary());
        b.go_down("offline");

        let outcome = coordinator.create(goal()).await.unwrap();

        assert!(outcome.b.failed());
        assert_eq!(outcome.a, BackendOutcome::NotAttempted);
        assert!(a.calls().is_empty());
    }

    #[tokio::test]
    async fn test_required_secondary_failure_reports_failure() {
        let (a, b, coordinator) = setup(SyncPolicy::default().with_fail_fast_secondary());
        b.fail_next(CallKind::Create, BackendError::Validation("bad field".to_string()));

        let outcome = coordinator.create(goal()).await.unwrap();

        assert!(!outcome.overall_success);
        assert!(outcome.a.succeeded());
        assert_eq!(outcome.b.failure_kind(), Some(crate::error::FailureKind::Validation));
        // No rollback requested, so the primary copy stays
        assert_eq!(a.record_count(), 1);
        assert!(outcome.compensation.is_none());
    }

    #[tokio::test]
    async fn test_invalid_record_never_reaches_a_store() {
        let (a, b, coordinator) = setup(SyncPolicy::default());
        let mut bad = goal();
        bad.name = String::new();

        let err = coordinator.create(bad).await.unwrap_err();

        assert!(matches!(err, SyncError::InvalidRecord { .. }));
        assert!(a.calls().is_empty());
        assert!(b.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_skips_store_without_identifier() {
        let (a, b, coordinator) = setup(SyncPolicy::default());
        a.seed(EntityKind::Goal, "g7", goal().to_fields().unwrap());

        let patch = GoalPatch {
            current_value: Some(500.0),
            ..Default::default()
        };
        let outcome = coordinator
            .update::<Goal>(RecordRef::only(Slot::A, "g7"), patch)
            .await
            .unwrap();

        assert!(outcome.overall_success);
        assert_eq!(outcome.b, BackendOutcome::NotAttempted);
        assert!(b.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_any_identifier_is_a_caller_error() {
        let (_, _, coordinator) = setup(SyncPolicy::default());
        let patch = GoalPatch {
            name: Some("x".to_string()),
            ..Default::default()
        };

        let err = coordinator.update::<Goal>(RecordRef::default(), patch).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingIdentifier(_)));
    }

    #[tokio::test]
    async fn test_execute_json_rejects_unknown_kind_and_bad_payload() {
        let (_, _, coordinator) = setup(SyncPolicy::default());

        let err = coordinator
            .execute_json("portfolio", OperationKind::Create, None, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedEntity(_)));

        let err = coordinator
            .execute_json("goals", OperationKind::Create, None, serde_json::json!({ "name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn test_execute_json_create_goal() {
        let (a, b, coordinator) = setup(SyncPolicy::default());

        let outcome = coordinator
            .execute_json(
                "goal",
                OperationKind::Create,
                None,
                serde_json::json!({
                    "name": "Vacation",
                    "target_value": 3000.0,
                    "unit": "EUR",
                    "deadline": "2026-08-01"
                }),
            )
            .await
            .unwrap();

        assert!(outcome.overall_success);
        assert_eq!(a.record_count(), 1);
        assert_eq!(b.record_count(), 1);
    }
}
