// Finance Sync - REST API
//
// /api/sync/...   : request handlers that go through the dual-write coordinator
// /api/stores/... : single-store routes, what RemoteBackend talks to

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{ApiResponse, CreatedResponse, TENANT_HEADER};
use crate::backend::{Backend, TenantId};
use crate::entities::{EntityKind, Fields};
use crate::error::{BackendError, FailureKind, SyncError};
use crate::sync::{DualWriteCoordinator, OperationKind, RecordRef, SyncOutcome, SyncPolicy};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    a: Arc<dyn Backend>,
    b: Arc<dyn Backend>,
    policy: SyncPolicy,
    stores: Arc<HashMap<String, Arc<dyn Backend>>>,
}

impl AppState {
    /// Both backends are also exposed as stores under their own names,
    /// so the two names must differ
    pub fn new(a: Arc<dyn Backend>, b: Arc<dyn Backend>, policy: SyncPolicy) -> anyhow::Result<Self> {
        if a.name() == b.name() {
            anyhow::bail!(
                "Both stores are named '{}'; store routes need distinct names",
                a.name()
            );
        }

        let mut stores = HashMap::new();
        stores.insert(a.name().to_string(), Arc::clone(&a));
        stores.insert(b.name().to_string(), Arc::clone(&b));
        Ok(AppState {
            a,
            b,
            policy,
            stores: Arc::new(stores),
        })
    }

    /// One coordinator per request, bound to the caller's tenant
    fn coordinator(&self, tenant: TenantId) -> DualWriteCoordinator {
        DualWriteCoordinator::new(tenant, Arc::clone(&self.a), Arc::clone(&self.b), self.policy.clone())
    }

    fn store(&self, name: &str) -> Result<&Arc<dyn Backend>, Response> {
        self.stores.get(name).ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("Unknown store: {}", name))
        })
    }
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/sync/:entity", post(sync_create))
        .route("/sync/:entity/:id", axum::routing::patch(sync_update).delete(sync_delete))
        .route("/stores/:store/:entity", post(store_create))
        .route(
            "/stores/:store/:entity/:id",
            get(store_get).patch(store_update).delete(store_delete),
        )
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Response helpers
// ============================================================================

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ApiResponse::<()>::err(message))).into_response()
}

fn backend_error_response(err: BackendError) -> Response {
    let status = match err.kind() {
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

fn sync_error_response(err: SyncError) -> Response {
    let status = match err {
        SyncError::UnsupportedEntity(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.to_string())
}

fn outcome_response(result: Result<SyncOutcome, SyncError>) -> Response {
    match result {
        Ok(outcome) if outcome.overall_success => {
            (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response()
        }
        Ok(outcome) => {
            let message = outcome.summary();
            (StatusCode::BAD_GATEWAY, Json(ApiResponse::failed_with(outcome, message))).into_response()
        }
        Err(err) => sync_error_response(err),
    }
}

fn tenant_from(headers: &HeaderMap) -> Result<TenantId, Response> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(TenantId::new)
        .ok_or_else(|| {
            error_response(
                StatusCode::UNAUTHORIZED,
                format!("Missing {} header", TENANT_HEADER),
            )
        })
}

fn parse_kind(entity: &str) -> Result<EntityKind, Response> {
    entity.parse::<EntityKind>().map_err(sync_error_response)
}

/// Per-store id overrides: `?a=<id>&b=<id>`; the path id fills the gaps
#[derive(Debug, Default, Deserialize)]
pub struct TargetQuery {
    a: Option<String>,
    b: Option<String>,
}

impl TargetQuery {
    fn record_ref(self, path_id: &str) -> RecordRef {
        RecordRef {
            a: Some(self.a.unwrap_or_else(|| path_id.to_string())),
            b: Some(self.b.unwrap_or_else(|| path_id.to_string())),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/sync/:entity - Create in both stores
async fn sync_create(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let tenant = match tenant_from(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };

    let result = state
        .coordinator(tenant)
        .execute_json(&entity, OperationKind::Create, None, payload)
        .await;
    outcome_response(result)
}

/// PATCH /api/sync/:entity/:id - Patch in both stores
async fn sync_update(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Query(query): Query<TargetQuery>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let tenant = match tenant_from(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };

    let result = state
        .coordinator(tenant)
        .execute_json(&entity, OperationKind::Update, Some(query.record_ref(&id)), payload)
        .await;
    outcome_response(result)
}

/// DELETE /api/sync/:entity/:id - Delete from both stores
async fn sync_delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Query(query): Query<TargetQuery>,
    headers: HeaderMap,
) -> Response {
    let tenant = match tenant_from(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };

    let result = state
        .coordinator(tenant)
        .execute_json(
            &entity,
            OperationKind::Delete,
            Some(query.record_ref(&id)),
            serde_json::Value::Null,
        )
        .await;
    outcome_response(result)
}

/// Store, kind and caller for a single-store route
fn store_target<'a>(
    state: &'a AppState,
    store: &str,
    entity: &str,
    headers: &HeaderMap,
) -> Result<(&'a Arc<dyn Backend>, EntityKind, TenantId), Response> {
    let tenant = tenant_from(headers)?;
    let backend = state.store(store)?;
    let kind = parse_kind(entity)?;
    Ok((backend, kind, tenant))
}

/// POST /api/stores/:store/:entity - Create in one store
async fn store_create(
    State(state): State<AppState>,
    Path((store, entity)): Path<(String, String)>,
    headers: HeaderMap,
    Json(fields): Json<Fields>,
) -> Response {
    let (backend, kind, tenant) = match store_target(&state, &store, &entity, &headers) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match backend.create(kind, &tenant, fields).await {
        Ok(id) => (StatusCode::CREATED, Json(ApiResponse::ok(CreatedResponse { id }))).into_response(),
        Err(e) => {
            tracing::warn!(store = %store, entity = %kind, error = %e, "store create failed");
            backend_error_response(e)
        }
    }
}

/// GET /api/stores/:store/:entity/:id - Read one record from one store
async fn store_get(
    State(state): State<AppState>,
    Path((store, entity, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let (backend, kind, tenant) = match store_target(&state, &store, &entity, &headers) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match backend.get(kind, &tenant, &id).await {
        Ok(Some(fields)) => (StatusCode::OK, Json(ApiResponse::ok(fields))).into_response(),
        Ok(None) => backend_error_response(BackendError::not_found(kind.collection(), &id)),
        Err(e) => backend_error_response(e),
    }
}

/// PATCH /api/stores/:store/:entity/:id - Patch one record in one store
async fn store_update(
    State(state): State<AppState>,
    Path((store, entity, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(patch): Json<Fields>,
) -> Response {
    let (backend, kind, tenant) = match store_target(&state, &store, &entity, &headers) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match backend.update(kind, &tenant, &id, patch).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(serde_json::json!({ "id": id })))).into_response(),
        Err(e) => {
            tracing::warn!(store = %store, entity = %kind, id = %id, error = %e, "store update failed");
            backend_error_response(e)
        }
    }
}

/// DELETE /api/stores/:store/:entity/:id - Delete one record from one store
async fn store_delete(
    State(state): State<AppState>,
    Path((store, entity, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let (backend, kind, tenant) = match store_target(&state, &store, &entity, &headers) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match backend.delete(kind, &tenant, &id).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok(serde_json::json!({ "id": id })))).into_response(),
        Err(e) => {
            tracing::warn!(store = %store, entity = %kind, id = %id, error = %e, "store delete failed");
            backend_error_response(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Slot;

    #[test]
    fn test_target_query_fills_missing_ids_from_path() {
        let query = TargetQuery {
            a: None,
            b: Some("doc-3".to_string()),
        };
        let target = query.record_ref("g1");
        assert_eq!(target.get(Slot::A), Some("g1"));
        assert_eq!(target.get(Slot::B), Some("doc-3"));
    }

    #[test]
    fn test_missing_tenant_header_is_unauthorized() {
        let response = tenant_from(&HeaderMap::new()).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_backend_errors_map_to_statuses() {
        let response = backend_error_response(BackendError::NotFound("gone".to_string()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = backend_error_response(BackendError::Validation("bad".to_string()));
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_stores_with_the_same_name_are_refused() {
        use crate::backend::MemoryBackend;

        let a: Arc<dyn Backend> = Arc::new(MemoryBackend::new("sqlite"));
        let b: Arc<dyn Backend> = Arc::new(MemoryBackend::new("sqlite"));
        assert!(AppState::new(a, b, SyncPolicy::default()).is_err());
    }
}
